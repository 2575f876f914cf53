use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw::{self, DrawMode, Status},
    entry,
    lifecycle::{Event, IllegalTransition},
    now,
    sea_query::Expr,
    winner, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use rand::rngs::OsRng;
use serde::Serialize;
use tracing::info;

use super::{transition_update, unix_timestamp, WinnerData};
use crate::selector::{self, Audit, SelectionError};

/// Errors that may occur while drawing winners.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DrawRunError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Selection population is inconsistent.
    SelectionError(SelectionError),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,

    /// Winners can only be drawn from frozen or drawn draws.
    #[status(StatusCode::CONFLICT)]
    IllegalTransition(IllegalTransition),

    /// Draw status was changed by a concurrent request.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw was modified concurrently")]
    ConcurrentModification,

    /// Not enough eligible entries to pick winners and alternates.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    InsufficientEntries(#[error(ignore)] String),
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct DrawRunResponse {
    status: Status,
    picked: Vec<WinnerData>,
    audit: Audit,
    drawn_at: i64,
}

/// Draw winners and alternates.
///
/// Repeating the draw replaces the previous winners and audit record.
pub(super) async fn draw(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<DrawRunResponse>, DrawRunError> {
    db.transaction(|txn| {
        Box::pin(async move {
            let model = draw::Entity::find_by_id(id)
                .one(txn)
                .await?
                .ok_or(DrawRunError::DrawNotFound)?;

            let result = transition_update(&model, Event::Draw)?.exec(txn).await?;

            if result.rows_affected != 1 {
                return Err(DrawRunError::ConcurrentModification);
            }

            let population = entry::list_eligible(
                txn,
                id,
                model.draw_mode == DrawMode::RandomCorrect,
            )
            .await?;

            let (winners, alternates) = model.pick_counts();

            let selection =
                selector::select_winners(&mut OsRng, id, &population, winners, alternates)
                    .map_err(|err| match err {
                        SelectionError::InsufficientEntries { .. } => {
                            DrawRunError::InsufficientEntries(err.to_string())
                        }
                        err => DrawRunError::SelectionError(err),
                    })?;

            let drawn_at = now();

            winner::Entity::delete_many()
                .filter(winner::Column::DrawId.eq(id))
                .exec(txn)
                .await?;

            winner::Entity::insert_many(selection.picked.iter().map(|pick| {
                winner::ActiveModel {
                    draw_id: ActiveValue::Set(id),
                    rank: ActiveValue::Set(pick.rank),
                    winner_type: ActiveValue::Set(pick.winner_type),
                    entry_id: ActiveValue::Set(pick.entry.id),
                    selected_at: ActiveValue::Set(drawn_at),
                    proof_url: ActiveValue::Set(pick.entry.proof_url.clone()),
                    ..Default::default()
                }
            }))
            .exec_without_returning(txn)
            .await?;

            draw::Entity::update_many()
                .col_expr(
                    draw::Column::AuditSeed,
                    Expr::value(selection.audit.seed.clone()),
                )
                .col_expr(
                    draw::Column::AuditHashBefore,
                    Expr::value(selection.audit.hash_before.clone()),
                )
                .col_expr(
                    draw::Column::AuditHashAfter,
                    Expr::value(selection.audit.hash_after.clone()),
                )
                .col_expr(draw::Column::DrawnAt, Expr::value(drawn_at))
                .filter(draw::Column::Id.eq(id))
                .exec(txn)
                .await?;

            info!(
                draw_id = %id,
                population = population.len(),
                picked = selection.picked.len(),
                hash_after = %selection.audit.hash_after,
                "winners drawn"
            );

            let picked = selection
                .picked
                .iter()
                .map(|pick| WinnerData {
                    rank: pick.rank,
                    winner_type: pick.winner_type,
                    entry_id: pick.entry.id,
                    author_id: Some(pick.entry.author_id.clone()),
                    author_name: pick.entry.author_name.clone(),
                    proof_url: pick.entry.proof_url.clone(),
                })
                .collect();

            Ok(Json(DrawRunResponse {
                status: Status::Drawn,
                picked,
                audit: selection.audit,
                drawn_at: unix_timestamp(drawn_at),
            }))
        })
    })
    .await
    .into_raw_result()
}
