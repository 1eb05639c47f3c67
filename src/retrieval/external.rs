//! External search endpoint client
//!
//! Consulted only when local evidence falls below the similarity threshold.
//! Every failure mode here (timeout, non-success status, transport error)
//! recovers to an empty result at the call site; none is fatal to a turn.

use crate::catalog::TagValue;
use crate::config::ExternalConfig;
use crate::retrieval::Passage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExternalSearchError {
    #[error("External search request failed: {0}")]
    Request(String),

    #[error("External search timed out after {0:?}")]
    Timeout(Duration),

    #[error("External search returned status {status}")]
    Status { status: u16 },

    #[error("Malformed external search response: {0}")]
    MalformedResponse(String),
}

/// Query seam over the external search endpoint
#[async_trait]
pub trait ExternalSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, ExternalSearchError>;
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    content: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    score: Option<f32>,
}

/// HTTP client for the external endpoint, with a bounded request timeout
pub struct HttpExternalSearch {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpExternalSearch {
    /// Build a client from config. Returns `None` when the endpoint is
    /// disabled; the hybrid retriever then never consults it.
    pub fn from_config(config: &ExternalConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "external search enabled but API key variable is unset; requests go unauthenticated"
            );
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder().timeout(timeout).build().ok()?;

        Some(Self {
            http,
            url: config.url.clone(),
            api_key,
            timeout,
        })
    }
}

#[async_trait]
impl ExternalSearch for HttpExternalSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, ExternalSearchError> {
        let mut request = self
            .http
            .post(&self.url)
            .json(&SearchRequest { query, k });

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExternalSearchError::Timeout(self.timeout)
            } else {
                ExternalSearchError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalSearchError::Status {
                status: status.as_u16(),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ExternalSearchError::MalformedResponse(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .filter(|hit| !hit.content.is_empty())
            .map(|hit| {
                let mut passage = Passage::new(
                    hit.content,
                    hit.source.unwrap_or_else(|| "external".to_string()),
                );
                passage
                    .tags
                    .insert("origin".to_string(), TagValue::One("external".to_string()));
                passage.score = hit.score;
                passage
            })
            .collect())
    }
}
