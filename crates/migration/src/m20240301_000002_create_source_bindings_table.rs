use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SourceBindings::Table)
                    .col(
                        ColumnDef::new(SourceBindings::DrawId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SourceBindings::Platform)
                            .small_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SourceBindings::SocialPageId).string())
                    .col(
                        ColumnDef::new(SourceBindings::ExternalPostId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SourceBindings::PostUrl).string().not_null())
                    .col(ColumnDef::new(SourceBindings::Caption).text())
                    .col(ColumnDef::new(SourceBindings::PostPublishedAt).timestamp())
                    .col(ColumnDef::new(SourceBindings::CommentCount).big_integer())
                    .col(
                        ColumnDef::new(SourceBindings::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(SourceBindings::Table, SourceBindings::DrawId)
                            .to(crate::Draws::Table, crate::Draws::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SourceBindings::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum SourceBindings {
    Table,
    DrawId,
    Platform,
    SocialPageId,
    ExternalPostId,
    PostUrl,
    Caption,
    PostPublishedAt,
    CommentCount,
    UpdatedAt,
}
