//! Low-confidence answers: web search summarised by a chat model.
//!
//! Every failure on this path (missing key, HTTP error, empty search, empty
//! completion) ends in [`IDK_ANSWER`], so callers always get text back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::FallbackConfig;
use crate::error::Result;

pub const IDK_ANSWER: &str = "Sorry, I don't have that information right now.";

#[async_trait]
pub trait Fallback: Send + Sync {
    async fn resolve(&self, query: &str) -> String;
}

#[async_trait]
impl Fallback for Box<dyn Fallback> {
    async fn resolve(&self, query: &str) -> String {
        (**self).resolve(query).await
    }
}

/// Always answers [`IDK_ANSWER`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IdkFallback;

#[async_trait]
impl Fallback for IdkFallback {
    async fn resolve(&self, _query: &str) -> String {
        IDK_ANSWER.to_string()
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub fn summary_prompt(query: &str, blob: &str) -> String {
    format!(
        "Answer the user's question ONLY with information from the text below. \
         Be concise.\n\nTEXT:\n{blob}\n\nQUESTION: {query}\nANSWER:"
    )
}

/// Tavily-compatible search followed by an OpenAI-compatible chat completion.
pub struct WebFallback {
    http: reqwest::Client,
    config: FallbackConfig,
}

impl WebFallback {
    pub fn new(http: reqwest::Client, config: FallbackConfig) -> Self {
        Self { http, config }
    }

    fn search_key(&self) -> Option<&str> {
        self.config
            .search_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    pub async fn search(&self, api_key: &str, query: &str) -> Result<Vec<SearchHit>> {
        let response: SearchResponse = self
            .http
            .post(&self.config.search_url)
            .timeout(self.config.timeout)
            .json(&SearchRequest {
                api_key,
                query,
                max_results: self.config.max_results,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut hits = response.results;
        hits.truncate(self.config.max_results);
        Ok(hits)
    }

    pub async fn summarize(&self, query: &str, blob: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.chat_base_url.trim_end_matches('/')
        );
        let prompt = summary_prompt(query, blob);

        let mut request = self.http.post(url).timeout(self.config.timeout).json(&ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        });
        if let Some(key) = self.config.chat_api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response: ChatResponse = request.send().await?.error_for_status()?.json().await?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .unwrap_or_default())
    }

    async fn try_resolve(&self, api_key: &str, query: &str) -> Result<Option<String>> {
        let hits = self.search(api_key, query).await?;
        if hits.is_empty() {
            return Ok(None);
        }
        for hit in &hits {
            debug!(url = hit.url.as_deref().unwrap_or("-"), "search hit");
        }

        let blob = hits
            .iter()
            .map(|hit| hit.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let answer = self.summarize(query, &blob).await?;
        Ok(Some(answer).filter(|a| !a.is_empty()))
    }
}

#[async_trait]
impl Fallback for WebFallback {
    async fn resolve(&self, query: &str) -> String {
        let Some(api_key) = self.search_key() else {
            debug!("no search key configured, answering idk");
            return IDK_ANSWER.to_string();
        };

        match self.try_resolve(api_key, query).await {
            Ok(Some(answer)) => answer,
            Ok(None) => {
                warn!("web fallback produced nothing usable");
                IDK_ANSWER.to_string()
            }
            Err(err) => {
                warn!(error = %err, "web fallback failed");
                IDK_ANSWER.to_string()
            }
        }
    }
}
