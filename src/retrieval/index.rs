//! Vector index client
//!
//! The engine never builds or embeds into the index; it only queries it
//! through this narrow seam. `PassageIndex` allows in-process test doubles,
//! `HttpPassageIndex` talks to a remote index service.

use crate::catalog::{TagFilter, TagValue};
use crate::config::IndexConfig;
use crate::retrieval::Passage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index request failed: {0}")]
    Request(String),

    #[error("Index returned status {status}")]
    Status { status: u16 },

    #[error("Malformed index response: {0}")]
    MalformedResponse(String),
}

/// Query seam over the local vector index
#[async_trait]
pub trait PassageIndex: Send + Sync {
    /// Rank up to `k` passages for a query text, optionally constrained to
    /// one tag value
    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&TagFilter>,
    ) -> Result<Vec<Passage>, IndexError>;
}

#[derive(Serialize)]
struct IndexRequest<'a> {
    query: &'a str,
    k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a TagFilter>,
}

#[derive(Deserialize)]
struct IndexResponse {
    results: Vec<IndexHit>,
}

#[derive(Deserialize)]
struct IndexHit {
    content: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    tags: HashMap<String, TagValue>,
    #[serde(default)]
    score: Option<f32>,
}

/// HTTP client for a vector index service
pub struct HttpPassageIndex {
    http: reqwest::Client,
    url: String,
}

impl HttpPassageIndex {
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IndexError::Request(e.to_string()))?;

        Ok(Self {
            http,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl PassageIndex for HttpPassageIndex {
    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&TagFilter>,
    ) -> Result<Vec<Passage>, IndexError> {
        let request = IndexRequest {
            query: text,
            k,
            filter,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| IndexError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexError::Status {
                status: status.as_u16(),
            });
        }

        let body: IndexResponse = response
            .json()
            .await
            .map_err(|e| IndexError::MalformedResponse(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .map(|hit| Passage {
                content: hit.content,
                source: hit.source.unwrap_or_else(|| "unknown".to_string()),
                tags: hit.tags,
                score: hit.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_omits_absent_filter() {
        let request = IndexRequest {
            query: "who is Wu Song",
            k: 5,
            filter: None,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["query"], "who is Wu Song");
        assert_eq!(json["k"], 5);
        assert!(json.get("filter").is_none());
    }

    #[test]
    fn test_request_serialization_with_filter() {
        let filter = TagFilter::new("work", "water-margin");
        let request = IndexRequest {
            query: "tiger",
            k: 8,
            filter: Some(&filter),
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["filter"]["field"], "work");
        assert_eq!(json["filter"]["value"], "water-margin");
    }

    #[test]
    fn test_response_defaults() {
        let body = r#"{"results": [{"content": "some passage"}]}"#;
        let parsed: IndexResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.results.len(), 1);
        assert!(parsed.results[0].source.is_none());
        assert!(parsed.results[0].tags.is_empty());
        assert!(parsed.results[0].score.is_none());
    }

    #[test]
    fn test_response_with_tags() {
        let body = r#"{
            "results": [{
                "content": "passage",
                "source": "water-margin",
                "tags": {"work": "water-margin", "category": ["characters", "plot"]},
                "score": 0.83
            }]
        }"#;
        let parsed: IndexResponse = serde_json::from_str(body).unwrap();
        let hit = &parsed.results[0];

        assert_eq!(hit.score, Some(0.83));
        assert!(matches!(hit.tags.get("work"), Some(TagValue::One(_))));
        assert!(matches!(hit.tags.get("category"), Some(TagValue::Many(v)) if v.len() == 2));
    }
}
