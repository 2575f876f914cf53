use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw, publish_asset, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
};
use derive_more::{Display, Error, From};
use serde::Serialize;

use crate::{
    handlers::draws::{build_manifest, unix_timestamp},
    publish::Manifest,
};

/// Errors that may occur while loading a public result page.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum PublicViewError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// There is no published draw with the requested slug.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "result page not found")]
    NotFound,
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct PublicViewResponse {
    #[serde(flatten)]
    manifest: Manifest,
    video_url: Option<String>,
}

/// Public result page handler.
///
/// Only published draws are visible.
pub(super) async fn view(
    Path(slug): Path<String>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<PublicViewResponse>, PublicViewError> {
    let model = draw::Entity::find()
        .filter(draw::Column::PublicViewSlug.eq(slug.as_str()))
        .filter(draw::Column::Status.eq(draw::Status::Published))
        .one(&*db)
        .await?
        .ok_or(PublicViewError::NotFound)?;

    let asset = publish_asset::Entity::find_by_id(model.id).one(&*db).await?;

    let published_at = asset
        .as_ref()
        .map(|asset| unix_timestamp(asset.published_at))
        .unwrap_or_else(|| unix_timestamp(model.created_at));

    let manifest = build_manifest(&*db, &model, &slug, published_at).await?;

    Ok(Json(PublicViewResponse {
        manifest,
        video_url: asset.and_then(|asset| asset.video_url),
    }))
}
