//! Publish pipeline.
//!
//! Publishing a draw is split into two steps with separate failure domains:
//!
//! 1. [`Publisher::persist_manifest`] writes `manifest.json`, `winners.json` and a `queued`
//!    `render-status.json` under the draw's public slug. Republishing uses
//!    [`Publisher::write_manifest`] instead, which overwrites the manifest and winners only,
//!    so an already rendered video stays valid.
//! 2. [`Publisher::dispatch_render`] triggers the external render job. A failure here
//!    leaves the stored documents in place, and the step can be repeated with the retry route.
//!
//! The render service reports progress back through the callback route, which updates
//! `render-status.json`.

/// External render job dispatcher.
mod dispatch;

/// S3-backed document storage.
mod storage;

use std::sync::Arc;

use axum::async_trait;
use common::{config::Config, hash};
use db::draw::{Platform, VideoFormat};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub(crate) use dispatch::HttpDispatcher;
pub(crate) use storage::S3Store;

/// Errors that may occur while talking to external pipeline dependencies.
#[derive(Debug, Display, From, Error)]
pub(crate) enum PipelineError {
    /// Object storage request failed.
    #[display(fmt = "object storage error: {}", _0)]
    #[from(ignore)]
    Storage(#[error(ignore)] String),

    /// Render service request failed.
    #[display(fmt = "render dispatch error: {}", _0)]
    #[from(ignore)]
    Dispatch(#[error(ignore)] String),

    /// Document (de)serialization error.
    Serialization(serde_json::Error),

    /// Object storage is not configured.
    #[display(fmt = "object storage is not configured")]
    StorageUnavailable,

    /// Render service is not configured.
    #[display(fmt = "render service is not configured")]
    DispatcherUnavailable,
}

/// Durable storage for published documents.
#[async_trait]
pub(crate) trait DocumentStore: Send + Sync {
    /// Store a document, replacing any previous version.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), PipelineError>;

    /// Load a document, returning [`None`] if it doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PipelineError>;
}

/// External render job trigger.
#[async_trait]
pub(crate) trait RenderDispatcher: Send + Sync {
    /// Submit a render job. The job result is reported asynchronously through the callback route.
    async fn dispatch(&self, job: &RenderJob) -> Result<(), PipelineError>;
}

/// Branding options shown on the public result page and in the rendered video.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct Branding {
    pub show_logo: bool,
    pub show_contest_image: bool,
}

/// Fairness audit data exposed in the manifest.
///
/// Hashes are lowercase hex SHA-256 digests of UTF-8 strings and can be recomputed
/// by anyone holding the entry list:
///
/// - `hash_before` covers `"{draw_id}:{seed}:{ids}"`, with eligible entry ids sorted
///   ascending, in decimal, joined by `,`. Fields are separated by `:`.
/// - `hash_after` covers `"{ids}"`, with picked entry ids in rank order joined by `,`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct ManifestAudit {
    pub seed: String,
    pub hash_before: String,
    pub hash_after: String,
}

/// Single published winner.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct ManifestWinner {
    pub rank: i32,
    pub winner_type: db::winner::WinnerType,
    pub author_id: String,
    pub author_name: Option<String>,
    pub proof_url: Option<String>,
}

/// Public-facing description of a published draw.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub slug: String,
    pub draw_id: i64,
    pub title: String,
    pub platform: Platform,
    pub post_url: Option<String>,
    pub draw_code: Option<String>,
    pub branding: Branding,
    pub video_format: VideoFormat,
    pub audit: Option<ManifestAudit>,
    pub winners: Vec<ManifestWinner>,
    pub published_at: i64,
}

/// Render progress reported by the render service.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RenderState {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Contents of `render-status.json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct RenderStatus {
    pub status: RenderState,
    pub updated_at: i64,
    #[serde(default)]
    pub render_duration_sec: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub eta_seconds: Option<i64>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl RenderStatus {
    /// Fresh `queued` status.
    pub fn queued() -> Self {
        Self {
            status: RenderState::Queued,
            updated_at: db::OffsetDateTime::now_utc().unix_timestamp(),
            render_duration_sec: None,
            error_message: None,
            eta_seconds: None,
            video_url: None,
        }
    }
}

/// Render job submitted to the render service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct RenderJob {
    pub draw_id: i64,
    pub slug: String,
    pub manifest_key: String,
    pub winners_key: String,
    pub video_format: VideoFormat,
}

impl RenderJob {
    pub fn new(draw_id: i64, slug: &str, video_format: VideoFormat) -> Self {
        Self {
            draw_id,
            slug: slug.to_string(),
            manifest_key: manifest_key(slug),
            winners_key: winners_key(slug),
            video_format,
        }
    }
}

/// Stored documents of a published slug.
///
/// Missing or unreadable documents are reported as [`None`].
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    pub manifest: Option<serde_json::Value>,
    pub render_status: Option<RenderStatus>,
}

pub(crate) fn manifest_key(slug: &str) -> String {
    format!("{slug}/manifest.json")
}

pub(crate) fn winners_key(slug: &str) -> String {
    format!("{slug}/winners.json")
}

pub(crate) fn render_status_key(slug: &str) -> String {
    format!("{slug}/render-status.json")
}

/// Publish pipeline entrypoint, shared between route handlers.
pub(crate) struct Publisher {
    store: Option<Arc<dyn DocumentStore>>,
    dispatcher: Option<Arc<dyn RenderDispatcher>>,
    callback_secret: Option<String>,
}

impl Publisher {
    pub fn new(
        store: Option<Arc<dyn DocumentStore>>,
        dispatcher: Option<Arc<dyn RenderDispatcher>>,
        callback_secret: Option<String>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            callback_secret,
        }
    }

    /// Create a publisher from the storage and render configuration sections.
    ///
    /// Missing sections leave the corresponding dependency unconfigured.
    pub async fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let store = match &config.storage {
            Some(storage) => {
                let store: Arc<dyn DocumentStore> = Arc::new(S3Store::new(storage).await);
                Some(store)
            }
            None => {
                warn!("storage is not configured, publishing is disabled");
                None
            }
        };

        let dispatcher = match &config.render {
            Some(render) => {
                let dispatcher: Arc<dyn RenderDispatcher> = Arc::new(HttpDispatcher::new(render)?);
                Some(dispatcher)
            }
            None => {
                warn!("render service is not configured, render jobs won't be dispatched");
                None
            }
        };

        Ok(Self::new(
            store,
            dispatcher,
            config
                .render
                .as_ref()
                .map(|render| render.callback_secret.clone()),
        ))
    }

    /// Check if the document store is available.
    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&dyn DocumentStore, PipelineError> {
        self.store
            .as_deref()
            .ok_or(PipelineError::StorageUnavailable)
    }

    /// Verify the shared secret provided by the render service.
    ///
    /// Always fails when no secret is configured.
    pub fn verify_callback_secret(&self, provided: Option<&str>) -> bool {
        match (&self.callback_secret, provided) {
            (Some(expected), Some(provided)) if !expected.is_empty() => {
                hash::secrets_match(expected.as_bytes(), provided.as_bytes())
            }
            _ => false,
        }
    }

    /// Write the manifest, the winner list and a `queued` render status for the provided slug.
    pub async fn persist_manifest(&self, manifest: &Manifest) -> Result<(), PipelineError> {
        self.write_manifest(manifest).await?;
        self.reset_render_status(&manifest.slug).await
    }

    /// Overwrite the manifest and the winner list, keeping the current render status.
    pub async fn write_manifest(&self, manifest: &Manifest) -> Result<(), PipelineError> {
        let store = self.store()?;

        store
            .put(&manifest_key(&manifest.slug), serde_json::to_vec(manifest)?)
            .await?;

        store
            .put(
                &winners_key(&manifest.slug),
                serde_json::to_vec(&manifest.winners)?,
            )
            .await?;

        info!(draw_id = %manifest.draw_id, slug = %manifest.slug, "manifest persisted");

        Ok(())
    }

    /// Reset the render status of the provided slug to `queued`.
    pub async fn reset_render_status(&self, slug: &str) -> Result<(), PipelineError> {
        self.write_render_status(slug, &RenderStatus::queued())
            .await
    }

    /// Replace the render status of the provided slug.
    pub async fn write_render_status(
        &self,
        slug: &str,
        status: &RenderStatus,
    ) -> Result<(), PipelineError> {
        self.store()?
            .put(&render_status_key(slug), serde_json::to_vec(status)?)
            .await
    }

    /// Trigger the external render job.
    pub async fn dispatch_render(&self, job: &RenderJob) -> Result<(), PipelineError> {
        self.dispatcher
            .as_deref()
            .ok_or(PipelineError::DispatcherUnavailable)?
            .dispatch(job)
            .await?;

        info!(draw_id = %job.draw_id, slug = %job.slug, "render job dispatched");

        Ok(())
    }

    /// Read stored documents of the provided slug.
    ///
    /// Returns [`None`] if the document store is not configured. Read failures
    /// are logged and reported as missing documents.
    pub async fn snapshot(&self, slug: &str) -> Option<Snapshot> {
        let store = self.store.as_deref()?;

        let manifest = match store.get(&manifest_key(slug)).await {
            Ok(body) => body.and_then(|body| serde_json::from_slice(&body).ok()),
            Err(err) => {
                warn!(%slug, %err, "unable to read manifest");
                None
            }
        };

        let render_status = match store.get(&render_status_key(slug)).await {
            Ok(body) => body.and_then(|body| serde_json::from_slice(&body).ok()),
            Err(err) => {
                warn!(%slug, %err, "unable to read render status");
                None
            }
        };

        Some(Snapshot {
            manifest,
            render_status,
        })
    }
}
