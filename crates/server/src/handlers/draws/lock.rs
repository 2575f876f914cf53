use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw,
    lifecycle::{Event, IllegalTransition},
    now,
    sea_query::Expr,
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, PrimitiveDateTime,
    QueryFilter, TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use tracing::info;

use super::{transition_update, DrawData};

/// Errors that may occur while locking or unlocking entry collection.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DrawLockError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,

    /// Draw status doesn't allow changing the lock.
    #[status(StatusCode::CONFLICT)]
    IllegalTransition(IllegalTransition),

    /// Draw status was changed by a concurrent request.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw was modified concurrently")]
    ConcurrentModification,
}

/// Set or clear the entry collection lock.
///
/// Setting an already set lock (or clearing a cleared one) keeps the draw unchanged.
async fn set_lock(
    txn: &DatabaseTransaction,
    id: i64,
    event: Event,
) -> Result<draw::Model, DrawLockError> {
    let model = draw::Entity::find_by_id(id)
        .one(txn)
        .await?
        .ok_or(DrawLockError::DrawNotFound)?;

    let update = transition_update(&model, event)?;

    let update = match (event, model.locked_at) {
        (Event::Lock, None) => update
            .col_expr(draw::Column::LockedAt, Expr::value(now()))
            .filter(draw::Column::LockedAt.is_null()),
        (Event::Unlock, Some(_)) => update
            .col_expr(
                draw::Column::LockedAt,
                Expr::value(Option::<PrimitiveDateTime>::None),
            )
            .filter(draw::Column::LockedAt.is_not_null()),
        _ => return Ok(model),
    };

    if update.exec(txn).await?.rows_affected != 1 {
        return Err(DrawLockError::ConcurrentModification);
    }

    info!(draw_id = %id, %event, "draw lock changed");

    draw::Entity::find_by_id(id)
        .one(txn)
        .await?
        .ok_or(DrawLockError::DrawNotFound)
}

/// Lock entry collection, making the draw inputs read-only.
pub(super) async fn lock(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<DrawData>, DrawLockError> {
    db.transaction(|txn| Box::pin(async move { set_lock(txn, id, Event::Lock).await }))
        .await
        .into_raw_result()
        .map(|model| Json(model.into()))
}

/// Unlock entry collection of a draft draw.
pub(super) async fn unlock(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<DrawData>, DrawLockError> {
    db.transaction(|txn| Box::pin(async move { set_lock(txn, id, Event::Unlock).await }))
        .await
        .into_raw_result()
        .map(|model| Json(model.into()))
}
