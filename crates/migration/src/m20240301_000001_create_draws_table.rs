use db::draw::{AnswerMatch, DrawMode, Status, VideoFormat};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Draws::Table)
                    .col(
                        ColumnDef::new(Draws::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Draws::Platform).small_integer().not_null())
                    .col(ColumnDef::new(Draws::Title).string().not_null())
                    .col(
                        ColumnDef::new(Draws::Status)
                            .small_integer()
                            .not_null()
                            .default(Status::Draft),
                    )
                    .col(ColumnDef::new(Draws::WinnersCount).integer().not_null())
                    .col(
                        ColumnDef::new(Draws::AlternatesCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Draws::DrawMode)
                            .small_integer()
                            .not_null()
                            .default(DrawMode::RandomAll),
                    )
                    .col(
                        ColumnDef::new(Draws::AnswerMatch)
                            .small_integer()
                            .not_null()
                            .default(AnswerMatch::Exact),
                    )
                    .col(ColumnDef::new(Draws::CorrectAnswer).string())
                    .col(ColumnDef::new(Draws::LockedAt).timestamp())
                    .col(ColumnDef::new(Draws::DrawCode).string())
                    .col(ColumnDef::new(Draws::PublicViewSlug).string().unique_key())
                    .col(
                        ColumnDef::new(Draws::ShowLogo)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Draws::ShowContestImage)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Draws::VideoFormat)
                            .small_integer()
                            .not_null()
                            .default(VideoFormat::Vertical),
                    )
                    .col(ColumnDef::new(Draws::AuditSeed).string())
                    .col(ColumnDef::new(Draws::AuditHashBefore).string())
                    .col(ColumnDef::new(Draws::AuditHashAfter).string())
                    .col(ColumnDef::new(Draws::DrawnAt).timestamp())
                    .col(
                        ColumnDef::new(Draws::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Draws::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum Draws {
    Table,
    Id,
    Platform,
    Title,
    Status,
    WinnersCount,
    AlternatesCount,
    DrawMode,
    AnswerMatch,
    CorrectAnswer,
    LockedAt,
    DrawCode,
    PublicViewSlug,
    ShowLogo,
    ShowContestImage,
    VideoFormat,
    AuditSeed,
    AuditHashBefore,
    AuditHashAfter,
    DrawnAt,
    CreatedAt,
}
