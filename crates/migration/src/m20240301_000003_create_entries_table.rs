use db::entry::Status;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entries::Table)
                    .col(
                        ColumnDef::new(Entries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Entries::DrawId).big_integer().not_null())
                    .col(ColumnDef::new(Entries::ExternalId).string().not_null())
                    .col(ColumnDef::new(Entries::AuthorId).string().not_null())
                    .col(ColumnDef::new(Entries::AuthorName).string())
                    .col(ColumnDef::new(Entries::Content).text().not_null())
                    .col(
                        ColumnDef::new(Entries::Status)
                            .small_integer()
                            .not_null()
                            .default(Status::Eligible),
                    )
                    .col(ColumnDef::new(Entries::IsCorrect).boolean())
                    .col(ColumnDef::new(Entries::ProofUrl).string())
                    .col(
                        ColumnDef::new(Entries::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Entries::Table, Entries::DrawId)
                            .to(crate::Draws::Table, crate::Draws::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("entries_draw_id_external_id_idx")
                    .table(Entries::Table)
                    .col(Entries::DrawId)
                    .col(Entries::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Entries::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum Entries {
    Table,
    Id,
    DrawId,
    ExternalId,
    AuthorId,
    AuthorName,
    Content,
    Status,
    IsCorrect,
    ProofUrl,
    CreatedAt,
}
