//! Draw participant entry.
//!
//! Entries are collected from the bound post before the draw is frozen
//! and are only read by the draw itself.

use sea_orm::{entity::prelude::*, QueryOrder};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub draw_id: i64,
    /// Platform-specific identifier of the comment or submission.
    pub external_id: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub content: String,
    pub status: Status,
    pub is_correct: Option<bool>,
    pub proof_url: Option<String>,
    pub created_at: TimeDateTime,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[sea_orm(num_value = 0)]
    Eligible,
    #[sea_orm(num_value = 1)]
    Ineligible,
    /// Author already has an earlier entry in the same draw.
    #[sea_orm(num_value = 2)]
    Duplicate,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::draw::Entity",
        from = "Column::DrawId",
        to = "super::draw::Column::Id"
    )]
    Draw,
}

impl Related<super::draw::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Draw.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// List entries that take part in the selection of the provided draw.
///
/// Entries are ordered by their identifiers, so that the selection population
/// is stable between calls.
pub async fn list_eligible<C: ConnectionTrait>(
    db: &C,
    draw_id: i64,
    require_correct: bool,
) -> Result<Vec<Model>, DbErr> {
    let mut query = Entity::find()
        .filter(Column::DrawId.eq(draw_id))
        .filter(Column::Status.eq(Status::Eligible));

    if require_correct {
        query = query.filter(Column::IsCorrect.eq(true));
    }

    query.order_by_asc(Column::Id).all(db).await
}
