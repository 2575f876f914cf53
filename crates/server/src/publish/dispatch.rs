use std::time::Duration;

use axum::async_trait;
use common::config;
use reqwest::Client;

use super::{PipelineError, RenderDispatcher, RenderJob};

/// Render dispatcher that submits jobs to an HTTP endpoint.
pub(crate) struct HttpDispatcher {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpDispatcher {
    pub fn new(config: &config::Render) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| PipelineError::Dispatch(err.to_string()))?;

        Ok(Self {
            client,
            url: config.dispatch_url.clone(),
            token: config.dispatch_token.clone(),
        })
    }
}

#[async_trait]
impl RenderDispatcher for HttpDispatcher {
    async fn dispatch(&self, job: &RenderJob) -> Result<(), PipelineError> {
        let mut request = self.client.post(&self.url).json(job);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| PipelineError::Dispatch(err.to_string()))?;

        Ok(())
    }
}
