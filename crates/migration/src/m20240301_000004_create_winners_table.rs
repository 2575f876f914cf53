use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Winners::Table)
                    .col(
                        ColumnDef::new(Winners::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Winners::DrawId).big_integer().not_null())
                    .col(ColumnDef::new(Winners::Rank).integer().not_null())
                    .col(ColumnDef::new(Winners::WinnerType).small_integer().not_null())
                    .col(ColumnDef::new(Winners::EntryId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Winners::SelectedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .col(ColumnDef::new(Winners::ProofUrl).string())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Winners::Table, Winners::DrawId)
                            .to(crate::Draws::Table, crate::Draws::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Winners::Table, Winners::EntryId)
                            .to(crate::Entries::Table, crate::Entries::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("winners_draw_id_rank_idx")
                    .table(Winners::Table)
                    .col(Winners::DrawId)
                    .col(Winners::Rank)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Winners::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum Winners {
    Table,
    Id,
    DrawId,
    Rank,
    WinnerType,
    EntryId,
    SelectedAt,
    ProofUrl,
}
