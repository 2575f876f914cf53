use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use db::{draw, DatabaseConnection, DbErr, EntityTrait};
use derive_more::{Display, Error, From};
use serde::Serialize;
use tracing::{error, info};

use crate::publish::{PipelineError, Publisher, RenderJob, RenderState};

/// Errors that may occur while retrying the render job.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum RenderRetryError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,

    /// Draw was never published.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw has no public view slug")]
    NotPublished,

    /// Document storage is not configured.
    #[status(StatusCode::SERVICE_UNAVAILABLE)]
    #[display(fmt = "publishing is not configured")]
    StorageUnavailable,

    /// External pipeline dependency failed.
    #[status(StatusCode::BAD_GATEWAY)]
    #[display(fmt = "publish pipeline error: {}", _0)]
    PipelineError(PipelineError),
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct RenderRetryResponse {
    slug: String,
    render_status: RenderState,
}

/// Reset the render status and dispatch the render job again.
pub(super) async fn retry(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(publisher): Extension<Arc<Publisher>>,
) -> Result<Json<RenderRetryResponse>, RenderRetryError> {
    let model = draw::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or(RenderRetryError::DrawNotFound)?;

    let slug = model
        .public_view_slug
        .ok_or(RenderRetryError::NotPublished)?;

    if !publisher.is_configured() {
        return Err(RenderRetryError::StorageUnavailable);
    }

    let job = RenderJob::new(id, &slug, model.video_format);

    let result = async {
        publisher.reset_render_status(&slug).await?;
        publisher.dispatch_render(&job).await
    }
    .await;

    if let Err(err) = result {
        error!(draw_id = %id, %slug, %err, "unable to retry render job");
        return Err(err.into());
    }

    info!(draw_id = %id, %slug, "render job retried");

    Ok(Json(RenderRetryResponse {
        slug,
        render_status: RenderState::Queued,
    }))
}
