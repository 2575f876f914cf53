//! Selected draw winners and alternates.
//!
//! Winners are replaced as a whole every time a draw is (re)run.

use sea_orm::{entity::prelude::*, QueryOrder};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "winners")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub draw_id: i64,
    pub rank: i32,
    pub winner_type: WinnerType,
    pub entry_id: i64,
    pub selected_at: TimeDateTime,
    pub proof_url: Option<String>,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinnerType {
    #[sea_orm(num_value = 0)]
    Winner,
    #[sea_orm(num_value = 1)]
    Alternate,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::draw::Entity",
        from = "Column::DrawId",
        to = "super::draw::Column::Id"
    )]
    Draw,

    #[sea_orm(
        belongs_to = "super::entry::Entity",
        from = "Column::EntryId",
        to = "super::entry::Column::Id"
    )]
    Entry,
}

impl Related<super::draw::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Draw.def()
    }
}

impl Related<super::entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// List winners of the provided draw together with their entries, ordered by rank.
pub async fn ranked<C: ConnectionTrait>(
    db: &C,
    draw_id: i64,
) -> Result<Vec<(Model, Option<super::entry::Model>)>, DbErr> {
    Entity::find()
        .filter(Column::DrawId.eq(draw_id))
        .order_by_asc(Column::Rank)
        .find_also_related(super::entry::Entity)
        .all(db)
        .await
}
