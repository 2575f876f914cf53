use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use axum_derive_error::ErrorResponse;
use db::{
    draw::{self, AnswerMatch, DrawMode, Platform, VideoFormat},
    now, ActiveValue, DatabaseConnection, DbErr, EntityTrait, OffsetDateTime, PrimitiveDateTime,
};
use derive_more::{Display, Error, From};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::DrawData;
use crate::validation::ValidatedJson;

/// Errors that may occur during the draw creation process.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DrawCreateError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Provided lock timestamp is out of range.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "invalid lock timestamp")]
    InvalidTimestamp,
}

fn default_true() -> bool {
    true
}

/// JSON request body.
#[derive(Deserialize, Validate)]
pub(super) struct DrawCreateRequest {
    /// Platform entries will be collected from.
    platform: Platform,

    /// Operator-facing draw title.
    #[validate(length(min = 1, max = 200))]
    title: String,

    /// Amount of winners to pick.
    #[validate(range(min = 1, max = 1000))]
    winners_count: i32,

    /// Amount of alternates to pick after the winners.
    #[serde(default)]
    #[validate(range(min = 0, max = 1000))]
    alternates_count: i32,

    #[serde(default = "default_draw_mode")]
    draw_mode: DrawMode,

    #[serde(default = "default_answer_match")]
    answer_match: AnswerMatch,

    /// Expected answer, used to compute entry correctness during import.
    #[validate(length(min = 1, max = 500))]
    correct_answer: Option<String>,

    /// Entry collection cut-off, as UNIX timestamp.
    locked_at: Option<i64>,

    #[serde(default = "default_true")]
    show_logo: bool,

    #[serde(default = "default_true")]
    show_contest_image: bool,

    #[serde(default = "default_video_format")]
    video_format: VideoFormat,
}

fn default_draw_mode() -> DrawMode {
    DrawMode::RandomAll
}

fn default_answer_match() -> AnswerMatch {
    AnswerMatch::Exact
}

fn default_video_format() -> VideoFormat {
    VideoFormat::Vertical
}

/// Convert a UNIX timestamp provided by the operator into a stored timestamp.
pub(super) fn parse_timestamp(value: i64) -> Option<PrimitiveDateTime> {
    let value = OffsetDateTime::from_unix_timestamp(value).ok()?;

    Some(PrimitiveDateTime::new(value.date(), value.time()))
}

/// Draw creation handler.
pub(super) async fn create(
    State(db): State<Arc<DatabaseConnection>>,
    ValidatedJson(request): ValidatedJson<DrawCreateRequest>,
) -> Result<Json<DrawData>, DrawCreateError> {
    let locked_at = request
        .locked_at
        .map(|value| parse_timestamp(value).ok_or(DrawCreateError::InvalidTimestamp))
        .transpose()?;

    let model = draw::Entity::insert(draw::ActiveModel {
        platform: ActiveValue::Set(request.platform),
        title: ActiveValue::Set(request.title),
        status: ActiveValue::Set(draw::Status::Draft),
        winners_count: ActiveValue::Set(request.winners_count),
        alternates_count: ActiveValue::Set(request.alternates_count),
        draw_mode: ActiveValue::Set(request.draw_mode),
        answer_match: ActiveValue::Set(request.answer_match),
        correct_answer: ActiveValue::Set(request.correct_answer),
        locked_at: ActiveValue::Set(locked_at),
        show_logo: ActiveValue::Set(request.show_logo),
        show_contest_image: ActiveValue::Set(request.show_contest_image),
        video_format: ActiveValue::Set(request.video_format),
        created_at: ActiveValue::Set(now()),
        ..Default::default()
    })
    .exec_with_returning(&*db)
    .await?;

    info!(draw_id = %model.id, platform = ?model.platform, "draw created");

    Ok(Json(model.into()))
}
