use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use derive_more::{Display, Error, From};
use futures_util::TryStreamExt;
use serde::Deserialize;

use super::DrawData;
use crate::pagination::Pagination;

/// Errors that may occur during the list request.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DrawListError {
    /// Database-related error.
    DatabaseError(DbErr),
}

/// Optional list filters.
#[derive(Deserialize)]
pub(super) struct DrawListFilter {
    status: Option<draw::Status>,
}

/// List draws, newest first.
pub(super) async fn list(
    State(db): State<Arc<DatabaseConnection>>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<DrawListFilter>,
) -> Result<Json<Vec<DrawData>>, DrawListError> {
    let mut query = draw::Entity::find();

    if let Some(status) = filter.status {
        query = query.filter(draw::Column::Status.eq(status));
    }

    query
        .limit(pagination.limit())
        .offset(pagination.offset())
        .order_by_desc(draw::Column::Id)
        .stream(&*db)
        .await?
        .err_into()
        .map_ok(DrawData::from)
        .try_collect()
        .await
        .map(Json)
}
