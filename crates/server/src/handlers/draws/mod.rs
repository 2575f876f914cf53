mod callback;
mod create;
mod details;
mod entries;
mod freeze;
mod list;
mod lock;
mod publish;
mod retry;
mod selection;
mod source;
mod status;
mod update;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use common::config::Config;
use db::{
    draw::{self, AnswerMatch, DrawMode, Platform, Status, VideoFormat},
    entry,
    lifecycle::{self, Event, IllegalTransition},
    sea_query::Expr,
    source_binding, winner, ColumnTrait, DatabaseConnection, EntityTrait, PrimitiveDateTime,
    QueryFilter, UpdateMany,
};
use serde::Serialize;

use crate::auth;

pub(crate) use publish::build_manifest;

pub(crate) fn routes(config: Arc<Config>) -> Router<Arc<DatabaseConnection>> {
    let operator_routes = Router::new()
        .route("/", get(list::list).post(create::create))
        .route("/:id", get(details::details).patch(update::update))
        .route("/:id/source", post(source::source))
        .route("/:id/entries", post(entries::import))
        .route("/:id/lock", post(lock::lock))
        .route("/:id/unlock", post(lock::unlock))
        .route("/:id/freeze", post(freeze::freeze))
        .route("/:id/draw", post(selection::draw))
        .route("/:id/publish", post(publish::publish))
        .route("/:id/publish/retry", post(retry::retry))
        .route("/:id/publish/status", get(status::status))
        .route_layer(from_fn_with_state(config, auth::require_operator));

    // Authenticated with the render callback secret instead of the operator token.
    let render_routes = Router::new().route("/:id/publish/callback", post(callback::callback));

    Router::new().merge(operator_routes).merge(render_routes)
}

/// Convert a stored timestamp into UNIX seconds.
pub(crate) fn unix_timestamp(value: PrimitiveDateTime) -> i64 {
    value.assume_utc().unix_timestamp()
}

/// Build a conditional status update for the provided lifecycle event.
///
/// The update only matches the draw while its status still accepts the event.
/// Callers must check that exactly one row was affected.
pub(super) fn transition_update(
    draw: &draw::Model,
    event: Event,
) -> Result<UpdateMany<draw::Entity>, IllegalTransition> {
    let next = lifecycle::transition(draw.status, event)?;

    Ok(draw::Entity::update_many()
        .col_expr(draw::Column::Status, Expr::value(next))
        .filter(draw::Column::Id.eq(draw.id))
        .filter(draw::Column::Status.is_in(lifecycle::accepted_from(event))))
}

/// Fairness audit record of the latest selection.
#[derive(Serialize)]
pub(crate) struct AuditData {
    seed: String,
    hash_before: String,
    hash_after: String,
}

impl AuditData {
    pub fn from_model(model: &draw::Model) -> Option<Self> {
        match (
            &model.audit_seed,
            &model.audit_hash_before,
            &model.audit_hash_after,
        ) {
            (Some(seed), Some(hash_before), Some(hash_after)) => Some(Self {
                seed: seed.clone(),
                hash_before: hash_before.clone(),
                hash_after: hash_after.clone(),
            }),
            _ => None,
        }
    }
}

/// Draw representation shared by the operator routes.
#[derive(Serialize)]
pub(crate) struct DrawData {
    id: i64,
    platform: Platform,
    title: String,
    status: Status,
    winners_count: i32,
    alternates_count: i32,
    draw_mode: DrawMode,
    answer_match: AnswerMatch,
    correct_answer: Option<String>,
    locked_at: Option<i64>,
    editable: bool,
    draw_code: Option<String>,
    public_view_slug: Option<String>,
    show_logo: bool,
    show_contest_image: bool,
    video_format: VideoFormat,
    audit: Option<AuditData>,
    drawn_at: Option<i64>,
    created_at: i64,
}

impl From<draw::Model> for DrawData {
    fn from(model: draw::Model) -> Self {
        Self {
            audit: AuditData::from_model(&model),
            editable: model.is_editable(),
            id: model.id,
            platform: model.platform,
            title: model.title,
            status: model.status,
            winners_count: model.winners_count,
            alternates_count: model.alternates_count,
            draw_mode: model.draw_mode,
            answer_match: model.answer_match,
            correct_answer: model.correct_answer,
            locked_at: model.locked_at.map(unix_timestamp),
            draw_code: model.draw_code,
            public_view_slug: model.public_view_slug,
            show_logo: model.show_logo,
            show_contest_image: model.show_contest_image,
            video_format: model.video_format,
            drawn_at: model.drawn_at.map(unix_timestamp),
            created_at: unix_timestamp(model.created_at),
        }
    }
}

/// Bound post representation.
#[derive(Serialize)]
pub(crate) struct SourceData {
    platform: Platform,
    social_page_id: Option<String>,
    external_post_id: String,
    post_url: String,
    caption: Option<String>,
    published_at: Option<i64>,
    comment_count: Option<i64>,
    updated_at: i64,
}

impl From<source_binding::Model> for SourceData {
    fn from(model: source_binding::Model) -> Self {
        Self {
            platform: model.platform,
            social_page_id: model.social_page_id,
            external_post_id: model.external_post_id,
            post_url: model.post_url,
            caption: model.caption,
            published_at: model.post_published_at.map(unix_timestamp),
            comment_count: model.comment_count,
            updated_at: unix_timestamp(model.updated_at),
        }
    }
}

/// Selected winner or alternate.
#[derive(Serialize)]
pub(crate) struct WinnerData {
    pub rank: i32,
    pub winner_type: winner::WinnerType,
    pub entry_id: i64,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub proof_url: Option<String>,
}

impl WinnerData {
    pub fn new(winner: winner::Model, entry: Option<entry::Model>) -> Self {
        let (author_id, author_name) = match entry {
            Some(entry) => (Some(entry.author_id), entry.author_name),
            None => (None, None),
        };

        Self {
            rank: winner.rank,
            winner_type: winner.winner_type,
            entry_id: winner.entry_id,
            author_id,
            author_name,
            proof_url: winner.proof_url,
        }
    }
}
