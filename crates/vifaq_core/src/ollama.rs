use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::config::DEFAULT_JUDGE_TIMEOUT;
use crate::error::{FaqError, Result};
use crate::stream::{accumulate, fragments};

/// Text generation against a locally hosted model.
#[async_trait]
pub trait Generate: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<G: Generate + ?Sized> Generate for Arc<G> {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        (**self).generate(model, prompt).await
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
///
/// Requests always stream, even when the caller only wants the final text:
/// the server may hold a non-streaming call open while it loads weights.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_JUDGE_TIMEOUT,
        }
    }

    /// Upper bound on one whole round trip, body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<impl Stream<Item = Result<String>>> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(%url, model, prompt_len = prompt.len(), "streaming generation request");

        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: true,
            })
            .send()
            .await?
            .error_for_status()?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(FaqError::from))
            .boxed();
        Ok(fragments(body))
    }
}

#[async_trait]
impl Generate for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let text = accumulate(self.generate_stream(model, prompt).await?).await?;
        debug!(model, chars = text.len(), "generation finished");
        Ok(text)
    }
}
