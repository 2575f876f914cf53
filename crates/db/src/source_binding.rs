//! External post a draw collects its entries from.
//!
//! There is at most one binding per draw, keyed by the draw identifier.

use sea_orm::entity::prelude::*;

use crate::draw::Platform;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "source_bindings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub draw_id: i64,
    pub platform: Platform,
    pub social_page_id: Option<String>,
    pub external_post_id: String,
    pub post_url: String,
    pub caption: Option<String>,
    pub post_published_at: Option<TimeDateTime>,
    pub comment_count: Option<i64>,
    pub updated_at: TimeDateTime,
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
