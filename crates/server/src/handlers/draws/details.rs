use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw, entry, source_binding, winner, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter,
};
use derive_more::{Display, Error, From};
use serde::Serialize;

use super::{DrawData, SourceData, WinnerData};

/// Errors that may occur during the detail preview process.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DrawDetailsError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,
}

/// Entry counters.
#[derive(Serialize)]
pub(super) struct EntryCounts {
    total: u64,
    eligible: u64,
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct DrawDetailsResponse {
    #[serde(flatten)]
    draw: DrawData,
    source: Option<SourceData>,
    entries: EntryCounts,
    winners: Vec<WinnerData>,
}

/// Draw details handler.
pub(super) async fn details(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<DrawDetailsResponse>, DrawDetailsError> {
    let model = draw::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or(DrawDetailsError::DrawNotFound)?;

    let source = source_binding::Entity::find_by_id(id).one(&*db).await?;

    let total = entry::Entity::find()
        .filter(entry::Column::DrawId.eq(id))
        .count(&*db)
        .await?;

    let eligible = entry::Entity::find()
        .filter(entry::Column::DrawId.eq(id))
        .filter(entry::Column::Status.eq(entry::Status::Eligible))
        .count(&*db)
        .await?;

    let winners = winner::ranked(&*db, id)
        .await?
        .into_iter()
        .map(|(winner, entry)| WinnerData::new(winner, entry))
        .collect();

    Ok(Json(DrawDetailsResponse {
        draw: model.into(),
        source: source.map(SourceData::from),
        entries: EntryCounts { total, eligible },
        winners,
    }))
}
