use axum::async_trait;
use common::{config, s3};

use super::{DocumentStore, PipelineError};

/// Document store backed by an S3-compatible bucket.
pub(crate) struct S3Store(s3::ConfiguredClient);

impl S3Store {
    pub async fn new(config: &config::Storage) -> Self {
        Self(s3::ConfiguredClient::new(config).await)
    }
}

#[async_trait]
impl DocumentStore for S3Store {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), PipelineError> {
        self.0
            .put_json(key, body)
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        self.0
            .get(key)
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }
}
