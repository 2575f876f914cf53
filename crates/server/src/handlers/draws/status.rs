use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use db::{draw, publish_asset, DatabaseConnection, DbErr, EntityTrait};
use derive_more::{Display, Error, From};
use serde::Serialize;

use crate::publish::{Publisher, RenderStatus};

/// Errors that may occur while reading the publish status.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum PublishStatusError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,
}

/// Overall publish state.
#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum PublishState {
    /// Draw has no public view slug yet.
    NotPublished,

    /// Stored documents are unavailable, only database state is reported.
    Fallback,

    Published,
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct PublishStatusResponse {
    status: PublishState,
    slug: Option<String>,
    manifest: Option<serde_json::Value>,
    render_status: Option<RenderStatus>,
    video_url: Option<String>,
}

/// Publish status polling handler.
///
/// Missing or unreadable stored documents are reported as nulls.
pub(super) async fn status(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(publisher): Extension<Arc<Publisher>>,
) -> Result<Json<PublishStatusResponse>, PublishStatusError> {
    let model = draw::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or(PublishStatusError::DrawNotFound)?;

    let Some(slug) = model.public_view_slug else {
        return Ok(Json(PublishStatusResponse {
            status: PublishState::NotPublished,
            slug: None,
            manifest: None,
            render_status: None,
            video_url: None,
        }));
    };

    let video_url = publish_asset::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .and_then(|asset| asset.video_url);

    let response = match publisher.snapshot(&slug).await {
        Some(snapshot) => PublishStatusResponse {
            status: PublishState::Published,
            video_url: video_url.or_else(|| {
                snapshot
                    .render_status
                    .as_ref()
                    .and_then(|status| status.video_url.clone())
            }),
            slug: Some(slug),
            manifest: snapshot.manifest,
            render_status: snapshot.render_status,
        },
        None => PublishStatusResponse {
            status: PublishState::Fallback,
            slug: Some(slug),
            manifest: None,
            render_status: None,
            video_url,
        },
    };

    Ok(Json(response))
}
