use std::{
    collections::HashMap,
    error::Error,
    sync::{Arc, Mutex},
};

use axum::{async_trait, body::Body, http::Request, Router};
use common::config::Config;
use db::{
    draw, entry, now, source_binding, ActiveValue, Database, DatabaseConnection, EntityTrait,
};
use hyper::body::{self, Bytes, HttpBody};
use migration::MigratorTrait;
use serde::Serialize;

use crate::publish::{DocumentStore, PipelineError, Publisher, RenderDispatcher, RenderJob};

pub(crate) const OPERATOR_TOKEN: &str = "operator-test-token";

pub(crate) const RENDER_SECRET: &str = "render-test-secret";

pub(crate) async fn create_database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("unable to create test database");

    migration::Migrator::up(&db, None)
        .await
        .expect("unable to run migrations");

    db
}

/// In-memory document store.
#[derive(Default)]
pub(crate) struct MemoryStore {
    documents: Mutex<HashMap<String, Vec<u8>>>,
    failing: bool,
}

impl MemoryStore {
    /// Store that rejects every request.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn insert(&self, key: &str, body: Vec<u8>) {
        self.documents
            .lock()
            .expect("poisoned lock")
            .insert(key.to_string(), body);
    }

    pub fn json(&self, key: &str) -> Option<serde_json::Value> {
        self.documents
            .lock()
            .expect("poisoned lock")
            .get(key)
            .map(|body| serde_json::from_slice(body).expect("invalid stored document"))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), PipelineError> {
        if self.failing {
            return Err(PipelineError::Storage(String::from("storage is down")));
        }

        self.insert(key, body);

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        if self.failing {
            return Err(PipelineError::Storage(String::from("storage is down")));
        }

        Ok(self
            .documents
            .lock()
            .expect("poisoned lock")
            .get(key)
            .cloned())
    }
}

/// Render dispatcher that records submitted jobs.
#[derive(Default)]
pub(crate) struct RecordingDispatcher {
    jobs: Mutex<Vec<RenderJob>>,
    failing: bool,
}

impl RecordingDispatcher {
    /// Dispatcher that rejects every job.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn jobs(&self) -> Vec<RenderJob> {
        self.jobs.lock().expect("poisoned lock").clone()
    }
}

#[async_trait]
impl RenderDispatcher for RecordingDispatcher {
    async fn dispatch(&self, job: &RenderJob) -> Result<(), PipelineError> {
        if self.failing {
            return Err(PipelineError::Dispatch(String::from("render service is down")));
        }

        self.jobs.lock().expect("poisoned lock").push(job.clone());

        Ok(())
    }
}

/// Test application with in-memory publish pipeline dependencies.
pub(crate) struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl TestApp {
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_pipeline(db, MemoryStore::default(), RecordingDispatcher::default())
    }

    pub fn with_pipeline(
        db: DatabaseConnection,
        store: MemoryStore,
        dispatcher: RecordingDispatcher,
    ) -> Self {
        let store = Arc::new(store);
        let dispatcher = Arc::new(dispatcher);

        let publisher = Publisher::new(
            Some(store.clone()),
            Some(dispatcher.clone()),
            Some(String::from(RENDER_SECRET)),
        );

        Self {
            router: crate::app_router(
                Arc::new(db),
                Arc::new(Config::for_tests()),
                Arc::new(publisher),
            ),
            store,
            dispatcher,
        }
    }

    /// Application without any publish pipeline dependencies.
    pub fn unconfigured(db: DatabaseConnection) -> Router {
        crate::app_router(
            Arc::new(db),
            Arc::new(Config::for_tests()),
            Arc::new(Publisher::new(None, None, None)),
        )
    }
}

/// Build an operator request without a body.
pub(crate) fn operator_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {OPERATOR_TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

/// Build an operator request with a JSON body.
pub(crate) fn operator_json<B: Serialize>(method: &str, uri: &str, body: B) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {OPERATOR_TOKEN}"))
        .header("Content-Type", "application/json")
        .body(Body::from_json(body))
        .unwrap()
}

/// Draw inserted directly into the database, bypassing the API.
pub(crate) struct DrawSetup {
    pub status: draw::Status,
    pub locked: bool,
    pub winners_count: i32,
    pub alternates_count: i32,
    pub draw_mode: draw::DrawMode,
    pub public_view_slug: Option<String>,
}

impl Default for DrawSetup {
    fn default() -> Self {
        Self {
            status: draw::Status::Draft,
            locked: false,
            winners_count: 1,
            alternates_count: 0,
            draw_mode: draw::DrawMode::RandomAll,
            public_view_slug: None,
        }
    }
}

pub(crate) async fn insert_draw(db: &DatabaseConnection, setup: DrawSetup) -> draw::Model {
    draw::Entity::insert(draw::ActiveModel {
        platform: ActiveValue::Set(draw::Platform::Facebook),
        title: ActiveValue::Set(String::from("Summer giveaway")),
        status: ActiveValue::Set(setup.status),
        winners_count: ActiveValue::Set(setup.winners_count),
        alternates_count: ActiveValue::Set(setup.alternates_count),
        draw_mode: ActiveValue::Set(setup.draw_mode),
        answer_match: ActiveValue::Set(draw::AnswerMatch::Exact),
        correct_answer: ActiveValue::Set(None),
        locked_at: ActiveValue::Set(setup.locked.then(now)),
        draw_code: ActiveValue::Set(
            (setup.status != draw::Status::Draft).then(|| String::from("ABCD-EFGH")),
        ),
        public_view_slug: ActiveValue::Set(setup.public_view_slug),
        show_logo: ActiveValue::Set(true),
        show_contest_image: ActiveValue::Set(false),
        video_format: ActiveValue::Set(draw::VideoFormat::Vertical),
        created_at: ActiveValue::Set(now()),
        ..Default::default()
    })
    .exec_with_returning(db)
    .await
    .expect("unable to create draw")
}

pub(crate) async fn bind_source(db: &DatabaseConnection, draw_id: i64) {
    source_binding::Entity::insert(source_binding::ActiveModel {
        draw_id: ActiveValue::Set(draw_id),
        platform: ActiveValue::Set(draw::Platform::Facebook),
        social_page_id: ActiveValue::Set(Some(String::from("page-1"))),
        external_post_id: ActiveValue::Set(String::from("post-1")),
        post_url: ActiveValue::Set(String::from("https://www.facebook.com/page/posts/1")),
        caption: ActiveValue::Set(None),
        post_published_at: ActiveValue::Set(None),
        comment_count: ActiveValue::Set(None),
        updated_at: ActiveValue::Set(now()),
    })
    .exec_without_returning(db)
    .await
    .expect("unable to bind source");
}

/// Insert entries with the provided correctness flags, one distinct author each.
pub(crate) async fn insert_entries(
    db: &DatabaseConnection,
    draw_id: i64,
    correctness: &[Option<bool>],
) -> Vec<entry::Model> {
    let mut entries = Vec::with_capacity(correctness.len());

    for (idx, is_correct) in correctness.iter().enumerate() {
        let model = entry::Entity::insert(entry::ActiveModel {
            draw_id: ActiveValue::Set(draw_id),
            external_id: ActiveValue::Set(format!("comment-{idx}")),
            author_id: ActiveValue::Set(format!("author-{idx}")),
            author_name: ActiveValue::Set(Some(format!("Author {idx}"))),
            content: ActiveValue::Set(String::from("42")),
            status: ActiveValue::Set(entry::Status::Eligible),
            is_correct: ActiveValue::Set(*is_correct),
            proof_url: ActiveValue::Set(Some(format!("https://facebook.com/comment/{idx}"))),
            created_at: ActiveValue::Set(now()),
            ..Default::default()
        })
        .exec_with_returning(db)
        .await
        .expect("unable to create entry");

        entries.push(model);
    }

    entries
}

pub(crate) trait RequestBodyExt: Sized {
    fn from_json<B: Serialize>(val: B) -> Self;
}

impl<T> RequestBodyExt for T
where
    T: HttpBody + From<Vec<u8>>,
{
    fn from_json<B: Serialize>(val: B) -> Self {
        T::from(serde_json::to_vec(&val).expect("unable to serialize"))
    }
}

#[async_trait(?Send)]
pub(crate) trait ResponseBodyExt {
    async fn bytes(self) -> Bytes;

    async fn text(self) -> String;

    async fn json(self) -> serde_json::Value;
}

#[async_trait(?Send)]
impl<T> ResponseBodyExt for T
where
    T: HttpBody,
    T::Error: Error,
{
    async fn bytes(self) -> Bytes {
        body::to_bytes(self)
            .await
            .expect("unable to convert to bytes")
    }

    async fn text(self) -> String {
        String::from_utf8(self.bytes().await.to_vec()).expect("unable to convert to text")
    }

    async fn json(self) -> serde_json::Value {
        serde_json::from_slice(&self.bytes().await).expect("unable to convert to json")
    }
}
