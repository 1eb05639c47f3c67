//! Hybrid retrieval
//!
//! Gathers candidate passages for a query: the local vector index first,
//! then — only when local evidence is weak — an optional external search
//! endpoint, with merge, deduplication and truncation. Retrieval-source
//! failures degrade to empty results; they are never fatal to a turn.

mod dedup;
mod external;
mod hybrid;
mod index;

pub use dedup::merge_deduplicated;
pub use external::{ExternalSearch, ExternalSearchError, HttpExternalSearch};
pub use hybrid::HybridRetriever;
pub use index::{HttpPassageIndex, IndexError, PassageIndex};

use crate::catalog::TagValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of leading content characters hashed into a passage fingerprint
pub const FINGERPRINT_PREFIX_CHARS: usize = 100;

/// One retrieved unit of source text. Immutable once retrieved; lives for a
/// single query turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,

    /// Source identifier (a work id, or the external endpoint's source name)
    pub source: String,

    /// Structured tags attached by the index
    #[serde(default)]
    pub tags: HashMap<String, TagValue>,

    /// Similarity score, when the source exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Passage {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            tags: HashMap::new(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Content-derived key for cross-source duplicate detection.
    /// Hashes only the leading characters so the same passage retrieved with
    /// different trailing truncation still collapses to one entry.
    pub fn fingerprint(&self) -> [u8; 32] {
        let prefix: String = self.content.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
        *blake3::hash(prefix.as_bytes()).as_bytes()
    }
}

/// Conservative stand-in similarities for indexes that do not expose
/// calibrated scores. An approximation inherited from the source system,
/// kept as an explicit value so tests and calibrated callers can override it.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityFallback {
    /// Assumed when at least `many_threshold` passages came back
    pub many_docs: f32,
    /// Assumed otherwise
    pub few_docs: f32,
    pub many_threshold: usize,
}

impl Default for SimilarityFallback {
    fn default() -> Self {
        Self {
            many_docs: 0.8,
            few_docs: 0.6,
            many_threshold: 3,
        }
    }
}

/// Ordered passage set for one query; insertion order is relevance order.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    passages: Vec<Passage>,
    external_consulted: bool,
}

impl RetrievalResult {
    pub fn new(passages: Vec<Passage>, external_consulted: bool) -> Self {
        Self {
            passages,
            external_consulted,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Whether the external endpoint was queried for this result
    pub fn external_consulted(&self) -> bool {
        self.external_consulted
    }

    /// Total content length across all passages, in characters
    pub fn combined_content_chars(&self) -> usize {
        self.passages.iter().map(|p| p.content.chars().count()).sum()
    }

    /// Highest similarity across the set. Uses attached scores when any
    /// passage carries one; otherwise the fallback heuristic.
    pub fn max_similarity(&self, fallback: &SimilarityFallback) -> f32 {
        if self.passages.is_empty() {
            return 0.0;
        }

        let best = self
            .passages
            .iter()
            .filter_map(|p| p.score)
            .filter(|s| *s > 0.0)
            .fold(None, |acc: Option<f32>, s| {
                Some(acc.map_or(s, |a| a.max(s)))
            });

        match best {
            Some(score) => score,
            None if self.passages.len() >= fallback.many_threshold => fallback.many_docs,
            None => fallback.few_docs,
        }
    }
}
