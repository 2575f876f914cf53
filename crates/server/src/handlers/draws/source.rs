use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw::{self, Platform},
    now,
    sea_query::OnConflict,
    source_binding, ActiveValue, DatabaseConnection, DbErr, EntityTrait, PrimitiveDateTime,
    TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::info;
use validator::{Validate, ValidationErrors};

use super::{create::parse_timestamp, SourceData};
use crate::validation::ValidatedJson;

static FACEBOOK_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^https?://([a-z0-9-]+\.)*(facebook\.com|fb\.com|fb\.watch)(/|$)"#)
        .expect("invalid regex string")
});

/// Instagram post, reel or IGTV URL, capturing the media shortcode.
static INSTAGRAM_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^https?://(www\.)?instagram\.com/(p|reel|reels|tv)/([A-Za-z0-9_-]+)"#)
        .expect("invalid regex string")
});

static TIKTOK_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^https?://([a-z0-9-]+\.)*tiktok\.com(/|$)"#).expect("invalid regex string")
});

/// TikTok video URL, capturing the numeric video identifier.
static TIKTOK_VIDEO_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"/video/(\d+)"#).expect("invalid regex string"));

/// Errors that may occur while binding a draw to a post.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum SourceBindError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,

    /// Draw is locked or already moved past the draft status.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw is no longer editable")]
    NotEditable,

    /// Post platform differs from the draw platform.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "post platform does not match the draw platform")]
    PlatformMismatch,

    /// Post data failed platform-specific validation.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "{}", _0)]
    InvalidSource(#[error(ignore)] &'static str),
}

/// Facebook page post.
#[derive(Deserialize, Validate)]
pub(super) struct FacebookSource {
    #[validate(length(min = 1, max = 128))]
    social_page_id: String,

    #[validate(length(min = 1, max = 128))]
    fb_post_id: String,

    #[validate(url)]
    post_url: String,

    #[validate(length(max = 2000))]
    post_text_snippet: Option<String>,

    published_at: Option<i64>,

    #[validate(range(min = 0))]
    comment_count: Option<i64>,
}

/// Instagram media.
#[derive(Deserialize, Validate)]
pub(super) struct InstagramSource {
    #[validate(url)]
    post_url: String,

    /// Graph API media identifier. Defaults to the shortcode from the post URL.
    #[validate(length(min = 1, max = 128))]
    ig_media_id: Option<String>,

    #[validate(length(max = 2000))]
    caption: Option<String>,

    published_at: Option<i64>,

    #[validate(range(min = 0))]
    comment_count: Option<i64>,
}

/// TikTok video.
#[derive(Deserialize, Validate)]
pub(super) struct TiktokSource {
    #[validate(url)]
    post_url: String,

    /// Video identifier. Defaults to the identifier from the post URL.
    #[validate(length(min = 1, max = 128))]
    video_id: Option<String>,

    #[validate(length(max = 2000))]
    caption: Option<String>,

    published_at: Option<i64>,

    #[validate(range(min = 0))]
    comment_count: Option<i64>,
}

/// JSON request body, tagged by the post platform.
#[derive(Deserialize)]
#[serde(tag = "platform", rename_all = "SCREAMING_SNAKE_CASE")]
pub(super) enum SourceBindRequest {
    Facebook(FacebookSource),
    Instagram(InstagramSource),
    Tiktok(TiktokSource),
}

impl Validate for SourceBindRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            SourceBindRequest::Facebook(source) => source.validate(),
            SourceBindRequest::Instagram(source) => source.validate(),
            SourceBindRequest::Tiktok(source) => source.validate(),
        }
    }
}

/// Normalized post data, common for all platforms.
struct Binding {
    platform: Platform,
    social_page_id: Option<String>,
    external_post_id: String,
    post_url: String,
    caption: Option<String>,
    published_at: Option<i64>,
    comment_count: Option<i64>,
}

impl SourceBindRequest {
    fn platform(&self) -> Platform {
        match self {
            SourceBindRequest::Facebook(_) => Platform::Facebook,
            SourceBindRequest::Instagram(_) => Platform::Instagram,
            SourceBindRequest::Tiktok(_) => Platform::Tiktok,
        }
    }

    fn into_binding(self) -> Result<Binding, SourceBindError> {
        match self {
            SourceBindRequest::Facebook(source) => {
                if !FACEBOOK_URL_REGEX.is_match(&source.post_url) {
                    return Err(SourceBindError::InvalidSource(
                        "post URL is not a Facebook URL",
                    ));
                }

                Ok(Binding {
                    platform: Platform::Facebook,
                    social_page_id: Some(source.social_page_id),
                    external_post_id: source.fb_post_id,
                    post_url: source.post_url,
                    caption: source.post_text_snippet,
                    published_at: source.published_at,
                    comment_count: source.comment_count,
                })
            }
            SourceBindRequest::Instagram(source) => {
                let shortcode = INSTAGRAM_URL_REGEX
                    .captures(&source.post_url)
                    .and_then(|captures| captures.get(3))
                    .map(|shortcode| shortcode.as_str().to_string())
                    .ok_or(SourceBindError::InvalidSource(
                        "post URL is not an Instagram post URL",
                    ))?;

                Ok(Binding {
                    platform: Platform::Instagram,
                    social_page_id: None,
                    external_post_id: source.ig_media_id.unwrap_or(shortcode),
                    post_url: source.post_url,
                    caption: source.caption,
                    published_at: source.published_at,
                    comment_count: source.comment_count,
                })
            }
            SourceBindRequest::Tiktok(source) => {
                if !TIKTOK_URL_REGEX.is_match(&source.post_url) {
                    return Err(SourceBindError::InvalidSource(
                        "post URL is not a TikTok URL",
                    ));
                }

                let video_id = source
                    .video_id
                    .or_else(|| {
                        TIKTOK_VIDEO_REGEX
                            .captures(&source.post_url)
                            .and_then(|captures| captures.get(1))
                            .map(|video_id| video_id.as_str().to_string())
                    })
                    .ok_or(SourceBindError::InvalidSource(
                        "unable to determine TikTok video identifier",
                    ))?;

                Ok(Binding {
                    platform: Platform::Tiktok,
                    social_page_id: None,
                    external_post_id: video_id,
                    post_url: source.post_url,
                    caption: source.caption,
                    published_at: source.published_at,
                    comment_count: source.comment_count,
                })
            }
        }
    }
}

/// Bind a draw to the post its entries are collected from.
///
/// Rebinding replaces the previous post.
pub(super) async fn source(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    ValidatedJson(request): ValidatedJson<SourceBindRequest>,
) -> Result<Json<SourceData>, SourceBindError> {
    db.transaction(|txn| {
        Box::pin(async move {
            let model = draw::Entity::find_by_id(id)
                .one(txn)
                .await?
                .ok_or(SourceBindError::DrawNotFound)?;

            if !model.is_editable() {
                return Err(SourceBindError::NotEditable);
            }

            if request.platform() != model.platform {
                return Err(SourceBindError::PlatformMismatch);
            }

            let binding = request.into_binding()?;

            let published_at: Option<PrimitiveDateTime> = binding
                .published_at
                .map(|value| {
                    parse_timestamp(value)
                        .ok_or(SourceBindError::InvalidSource("invalid post timestamp"))
                })
                .transpose()?;

            source_binding::Entity::insert(source_binding::ActiveModel {
                draw_id: ActiveValue::Set(id),
                platform: ActiveValue::Set(binding.platform),
                social_page_id: ActiveValue::Set(binding.social_page_id),
                external_post_id: ActiveValue::Set(binding.external_post_id),
                post_url: ActiveValue::Set(binding.post_url),
                caption: ActiveValue::Set(binding.caption),
                post_published_at: ActiveValue::Set(published_at),
                comment_count: ActiveValue::Set(binding.comment_count),
                updated_at: ActiveValue::Set(now()),
            })
            .on_conflict(
                OnConflict::column(source_binding::Column::DrawId)
                    .update_columns([
                        source_binding::Column::Platform,
                        source_binding::Column::SocialPageId,
                        source_binding::Column::ExternalPostId,
                        source_binding::Column::PostUrl,
                        source_binding::Column::Caption,
                        source_binding::Column::PostPublishedAt,
                        source_binding::Column::CommentCount,
                        source_binding::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(txn)
            .await?;

            info!(draw_id = %id, platform = ?model.platform, "draw source bound");

            let binding = source_binding::Entity::find_by_id(id)
                .one(txn)
                .await?
                .ok_or(SourceBindError::DrawNotFound)?;

            Ok(Json(binding.into()))
        })
    })
    .await
    .into_raw_result()
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, Router};
    use db::{draw, source_binding, DatabaseConnection, EntityTrait};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::testing::{
        create_database, insert_draw, operator_json, DrawSetup, ResponseBodyExt, TestApp,
    };

    async fn bind(router: Router, draw_id: i64, body: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(operator_json(
                "POST",
                &format!("/draws/{draw_id}/source"),
                body,
            ))
            .await
            .unwrap();

        let status = response.status();

        (status, response.json().await)
    }

    async fn binding(db: &DatabaseConnection, draw_id: i64) -> Option<source_binding::Model> {
        source_binding::Entity::find_by_id(draw_id)
            .one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn facebook() {
        let db = create_database().await;
        let draw = insert_draw(&db, DrawSetup::default()).await;
        let router = TestApp::new(db.clone()).router;

        let (status, body) = bind(
            router,
            draw.id,
            json!({
                "platform": "FACEBOOK",
                "social_page_id": "1234",
                "fb_post_id": "1234_5678",
                "post_url": "https://www.facebook.com/acme/posts/5678",
                "post_text_snippet": "Comment to win!",
                "published_at": 1700000000,
                "comment_count": 12
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["platform"], "FACEBOOK");
        assert_eq!(body["external_post_id"], "1234_5678");
        assert_eq!(body["caption"], "Comment to win!");
        assert_eq!(body["published_at"], 1700000000);

        let model = binding(&db, draw.id).await.unwrap();
        assert_eq!(model.social_page_id.as_deref(), Some("1234"));
    }

    #[tokio::test]
    async fn rebinding_replaces_post() {
        let db = create_database().await;
        let draw = insert_draw(&db, DrawSetup::default()).await;
        let router = TestApp::new(db.clone()).router;

        for post_id in ["1_1", "1_2"] {
            let (status, _) = bind(
                router.clone(),
                draw.id,
                json!({
                    "platform": "FACEBOOK",
                    "social_page_id": "1",
                    "fb_post_id": post_id,
                    "post_url": "https://facebook.com/acme/posts/1"
                }),
            )
            .await;

            assert_eq!(status, StatusCode::OK);
        }

        let model = binding(&db, draw.id).await.unwrap();
        assert_eq!(model.external_post_id, "1_2");
    }

    #[tokio::test]
    async fn platform_mismatch() {
        let db = create_database().await;
        let draw = insert_draw(&db, DrawSetup::default()).await;

        let (status, _) = bind(
            TestApp::new(db.clone()).router,
            draw.id,
            json!({
                "platform": "INSTAGRAM",
                "post_url": "https://www.instagram.com/p/Cabc123/"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(binding(&db, draw.id).await.is_none());
    }

    #[tokio::test]
    async fn foreign_host() {
        let db = create_database().await;
        let draw = insert_draw(&db, DrawSetup::default()).await;

        let (status, body) = bind(
            TestApp::new(db.clone()).router,
            draw.id,
            json!({
                "platform": "FACEBOOK",
                "social_page_id": "1",
                "fb_post_id": "1_1",
                "post_url": "https://facebook.com.evil.example/posts/1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "post URL is not a Facebook URL");
        assert!(binding(&db, draw.id).await.is_none());
    }

    #[tokio::test]
    async fn instagram_shortcode() {
        let db = create_database().await;
        let draw = insert_draw(&db, DrawSetup::default()).await;

        draw::Entity::update(draw::ActiveModel {
            id: db::ActiveValue::Unchanged(draw.id),
            platform: db::ActiveValue::Set(draw::Platform::Instagram),
            ..Default::default()
        })
        .exec(&db)
        .await
        .unwrap();

        let (status, body) = bind(
            TestApp::new(db).router,
            draw.id,
            json!({
                "platform": "INSTAGRAM",
                "post_url": "https://www.instagram.com/reel/Cx9_abc-1/?igsh=1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["external_post_id"], "Cx9_abc-1");
    }

    #[tokio::test]
    async fn locked_draw() {
        let db = create_database().await;
        let draw = insert_draw(
            &db,
            DrawSetup {
                locked: true,
                ..Default::default()
            },
        )
        .await;

        let (status, _) = bind(
            TestApp::new(db).router,
            draw.id,
            json!({
                "platform": "FACEBOOK",
                "social_page_id": "1",
                "fb_post_id": "1_1",
                "post_url": "https://facebook.com/acme/posts/1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
    }
}
