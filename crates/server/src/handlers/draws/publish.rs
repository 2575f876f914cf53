use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw::{self, generate_slug, Status},
    lifecycle::{Event, IllegalTransition},
    now, publish_asset,
    sea_query::{Expr, OnConflict},
    source_binding, winner, ActiveValue, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use serde::Serialize;
use tracing::{error, info};

use super::{transition_update, unix_timestamp};
use crate::publish::{
    Branding, Manifest, ManifestAudit, ManifestWinner, PipelineError, Publisher, RenderJob,
    RenderState,
};

/// Errors that may occur while publishing draw results.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DrawPublishError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,

    /// Only drawn draws can be published.
    #[status(StatusCode::CONFLICT)]
    IllegalTransition(IllegalTransition),

    /// Draw status was changed by a concurrent request.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw was modified concurrently")]
    ConcurrentModification,

    /// Document storage is not configured.
    #[status(StatusCode::SERVICE_UNAVAILABLE)]
    #[display(fmt = "publishing is not configured")]
    StorageUnavailable,

    /// External pipeline dependency failed.
    #[status(StatusCode::BAD_GATEWAY)]
    #[display(fmt = "publish pipeline error: {}", _0)]
    PipelineError(PipelineError),

    /// Draw was published, but the render job could not be submitted.
    #[status(StatusCode::BAD_GATEWAY)]
    #[display(fmt = "draw was published, but render dispatch failed: {}", _0)]
    #[from(ignore)]
    DispatchFailed(#[error(ignore)] String),
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct DrawPublishResponse {
    status: Status,
    slug: String,
    render_status: RenderState,
}

/// Build the public manifest of a draw.
pub(crate) async fn build_manifest<C: ConnectionTrait>(
    db: &C,
    model: &draw::Model,
    slug: &str,
    published_at: i64,
) -> Result<Manifest, DbErr> {
    let post_url = source_binding::Entity::find_by_id(model.id)
        .one(db)
        .await?
        .map(|binding| binding.post_url);

    let winners = winner::ranked(db, model.id)
        .await?
        .into_iter()
        .filter_map(|(winner, entry)| {
            let entry = entry?;

            Some(ManifestWinner {
                rank: winner.rank,
                winner_type: winner.winner_type,
                author_id: entry.author_id,
                author_name: entry.author_name,
                proof_url: winner.proof_url,
            })
        })
        .collect();

    let audit = match (
        &model.audit_seed,
        &model.audit_hash_before,
        &model.audit_hash_after,
    ) {
        (Some(seed), Some(hash_before), Some(hash_after)) => Some(ManifestAudit {
            seed: seed.clone(),
            hash_before: hash_before.clone(),
            hash_after: hash_after.clone(),
        }),
        _ => None,
    };

    Ok(Manifest {
        slug: slug.to_string(),
        draw_id: model.id,
        title: model.title.clone(),
        platform: model.platform,
        post_url,
        draw_code: model.draw_code.clone(),
        branding: Branding {
            show_logo: model.show_logo,
            show_contest_image: model.show_contest_image,
        },
        video_format: model.video_format,
        audit,
        winners,
        published_at,
    })
}

/// Publish draw results.
///
/// Stored documents are written inside the database transaction, so a storage failure
/// leaves the draw unpublished. The render job is dispatched after the commit.
///
/// Republishing a draw that already has a slug only overwrites the manifest and the
/// winner list. The render status is kept and no render job is dispatched, the retry
/// route re-renders explicitly.
pub(super) async fn publish(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(publisher): Extension<Arc<Publisher>>,
) -> Result<Json<DrawPublishResponse>, DrawPublishError> {
    if !publisher.is_configured() {
        return Err(DrawPublishError::StorageUnavailable);
    }

    let transaction_publisher = publisher.clone();

    let (job, republished) = db
        .transaction(|txn| {
            Box::pin(async move {
                let model = draw::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or(DrawPublishError::DrawNotFound)?;

                let republished = model.public_view_slug.is_some();

                let slug = model
                    .public_view_slug
                    .clone()
                    .unwrap_or_else(|| generate_slug(&model.title));

                let result = transition_update(&model, Event::Publish)?
                    .col_expr(draw::Column::PublicViewSlug, Expr::value(slug.clone()))
                    .exec(txn)
                    .await?;

                if result.rows_affected != 1 {
                    return Err(DrawPublishError::ConcurrentModification);
                }

                publish_asset::Entity::insert(publish_asset::ActiveModel {
                    draw_id: ActiveValue::Set(id),
                    video_url: ActiveValue::Set(None),
                    published_at: ActiveValue::Set(now()),
                })
                .on_conflict(
                    OnConflict::column(publish_asset::Column::DrawId)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(txn)
                .await?;

                let published_at = publish_asset::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .map(|asset| unix_timestamp(asset.published_at))
                    .unwrap_or_else(|| unix_timestamp(now()));

                let manifest = build_manifest(txn, &model, &slug, published_at).await?;

                let persisted = if republished {
                    transaction_publisher.write_manifest(&manifest).await
                } else {
                    transaction_publisher.persist_manifest(&manifest).await
                };

                if let Err(err) = persisted {
                    error!(draw_id = %id, %slug, %err, "unable to persist manifest");
                    return Err(err.into());
                }

                info!(draw_id = %id, %slug, republished, "draw published");

                Ok((RenderJob::new(id, &slug, model.video_format), republished))
            })
        })
        .await
        .into_raw_result()?;

    let render_status = if republished {
        publisher
            .snapshot(&job.slug)
            .await
            .and_then(|snapshot| snapshot.render_status)
            .map(|render_status| render_status.status)
            .unwrap_or(RenderState::Queued)
    } else {
        if let Err(err) = publisher.dispatch_render(&job).await {
            error!(draw_id = %id, slug = %job.slug, %err, "unable to dispatch render job");
            return Err(DrawPublishError::DispatchFailed(err.to_string()));
        }

        RenderState::Queued
    };

    Ok(Json(DrawPublishResponse {
        status: Status::Published,
        slug: job.slug,
        render_status,
    }))
}
