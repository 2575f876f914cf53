pub use aws_sdk_s3::Error;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use derive_more::{Display, Error, From};

use crate::config;

/// Errors that may occur while reading stored objects.
#[derive(Debug, Display, From, Error)]
pub enum ReadError {
    /// AWS S3-related error.
    S3(Error),

    /// Object body could not be collected.
    #[display(fmt = "unable to read object body: {}", _0)]
    Body(#[error(ignore)] String),
}

/// Configured S3 client.
///
/// Every object key is namespaced by the configured prefix.
pub struct ConfiguredClient {
    bucket: String,
    prefix: String,
    client: Client,
}

impl ConfiguredClient {
    /// Create new [`ConfiguredClient`] from the provided [`Storage`] configuration.
    ///
    /// [`Storage`]: config::Storage
    pub async fn new(config: &config::Storage) -> ConfiguredClient {
        let sdk_config = aws_config::from_env()
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None,
                None,
                "s3-client",
            ))
            .load()
            .await;

        ConfiguredClient {
            bucket: config.bucket.clone(),
            prefix: config.prefix.trim_end_matches('/').to_string(),
            client: Client::new(&sdk_config),
        }
    }

    /// Full object key for the provided relative key.
    pub fn key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    /// Upload a JSON document, replacing any previous version.
    pub async fn put_json(&self, key: &str, body: Vec<u8>) -> Result<(), Error> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(key))
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await?;

        Ok(())
    }

    /// Download an object, returning [`None`] if there is no object with the provided key.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ReadError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(key))
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let err = err.into_service_error();

                if err.is_no_such_key() {
                    return Ok(None);
                }

                return Err(ReadError::S3(err.into()));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| ReadError::Body(err.to_string()))?;

        Ok(Some(body.into_bytes().to_vec()))
    }
}
