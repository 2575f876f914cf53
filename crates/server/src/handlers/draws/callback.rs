use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw, now, publish_asset, sea_query::OnConflict, ActiveValue, DatabaseConnection, DbErr,
    EntityTrait, OffsetDateTime,
};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use validator::{Validate, ValidationErrors};

use crate::publish::{PipelineError, Publisher, RenderState, RenderStatus};

/// Header carrying the shared render callback secret.
pub(crate) const RENDER_SECRET_HEADER: &str = "x-render-secret";

/// Errors that may occur while processing a render callback.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum RenderCallbackError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Missing or invalid callback secret.
    #[status(StatusCode::UNAUTHORIZED)]
    #[display(fmt = "invalid render callback secret")]
    Unauthorized,

    /// Callback body is not a valid JSON document.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "invalid callback payload: {}", _0)]
    InvalidJson(serde_json::Error),

    /// Callback body failed validation.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "invalid callback payload: {}", _0)]
    InvalidPayload(ValidationErrors),

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

/// Render progress reported by the render service.
#[derive(Deserialize, Validate)]
pub(super) struct RenderCallbackPayload {
    status: RenderState,

    #[validate(range(min = 0.0))]
    render_duration_sec: Option<f64>,

    #[validate(length(max = 2000))]
    error_message: Option<String>,

    #[validate(range(min = 0))]
    eta_seconds: Option<i64>,

    #[serde(rename = "videoUrl", alias = "video_url")]
    #[validate(url)]
    video_url: Option<String>,
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct RenderCallbackResponse {
    received: bool,
}

/// Render service callback handler.
///
/// The shared secret is verified before anything else is read. Receiving
/// the same payload twice leaves the draw in the same state.
pub(super) async fn callback(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(publisher): Extension<Arc<Publisher>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RenderCallbackResponse>, RenderCallbackError> {
    let secret = headers
        .get(RENDER_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    if !publisher.verify_callback_secret(secret) {
        warn!(draw_id = %id, "render callback rejected");
        return Err(RenderCallbackError::Unauthorized);
    }

    let payload: RenderCallbackPayload = serde_json::from_slice(&body)?;
    payload.validate()?;

    let model = draw::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or(RenderCallbackError::DrawNotFound)?;

    let slug = model
        .public_view_slug
        .ok_or(RenderCallbackError::NotPublished)?;

    if !publisher.is_configured() {
        return Err(RenderCallbackError::StorageUnavailable);
    }

    let status = RenderStatus {
        status: payload.status,
        updated_at: OffsetDateTime::now_utc().unix_timestamp(),
        render_duration_sec: payload.render_duration_sec,
        error_message: payload.error_message,
        eta_seconds: payload.eta_seconds,
        video_url: payload.video_url.clone(),
    };

    if let Err(err) = publisher.write_render_status(&slug, &status).await {
        error!(draw_id = %id, %slug, %err, "unable to store render status");
        return Err(err.into());
    }

    if let Some(video_url) = payload.video_url {
        publish_asset::Entity::insert(publish_asset::ActiveModel {
            draw_id: ActiveValue::Set(id),
            video_url: ActiveValue::Set(Some(video_url)),
            published_at: ActiveValue::Set(now()),
        })
        .on_conflict(
            OnConflict::column(publish_asset::Column::DrawId)
                .update_column(publish_asset::Column::VideoUrl)
                .to_owned(),
        )
        .exec_without_returning(&*db)
        .await?;
    }

    info!(draw_id = %id, %slug, status = ?status.status, "render status updated");

    Ok(Json(RenderCallbackResponse { received: true }))
}
