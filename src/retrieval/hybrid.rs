//! Hybrid retrieval sequence
//!
//! Local index first; external endpoint only when local evidence is weak;
//! merge, deduplicate, truncate. Never raises for retrieval-source failures:
//! the caller always gets a `RetrievalResult`, possibly empty.

use crate::catalog::TagFilter;
use crate::config::RetrievalConfig;
use crate::retrieval::{
    merge_deduplicated, ExternalSearch, Passage, PassageIndex, RetrievalResult,
    SimilarityFallback,
};
use std::sync::Arc;

pub struct HybridRetriever {
    index: Arc<dyn PassageIndex>,
    external: Option<Arc<dyn ExternalSearch>>,
    similarity_threshold: f32,
    fallback: SimilarityFallback,
}

impl HybridRetriever {
    pub fn new(
        index: Arc<dyn PassageIndex>,
        external: Option<Arc<dyn ExternalSearch>>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            index,
            external,
            similarity_threshold: config.similarity_threshold,
            fallback: SimilarityFallback::default(),
        }
    }

    /// Override the no-score similarity heuristic
    pub fn with_fallback(mut self, fallback: SimilarityFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn fallback(&self) -> SimilarityFallback {
        self.fallback
    }

    /// Retrieve up to `k` passages for a query, optionally tag-constrained
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&TagFilter>,
    ) -> RetrievalResult {
        let local = self.retrieve_local(query, k, filter).await;

        let local_result = RetrievalResult::new(local, false);
        let max_similarity = local_result.max_similarity(&self.fallback);
        tracing::debug!(
            count = local_result.len(),
            max_similarity,
            "local retrieval complete"
        );

        if max_similarity >= self.similarity_threshold {
            return local_result;
        }

        let Some(external) = &self.external else {
            tracing::debug!("external search not configured, keeping local results");
            return local_result;
        };

        tracing::info!(
            max_similarity,
            threshold = self.similarity_threshold,
            "local evidence weak, consulting external search"
        );

        let external_passages = match external.search(query, k).await {
            Ok(passages) => {
                tracing::debug!(count = passages.len(), "external search returned");
                passages
            }
            Err(e) => {
                tracing::warn!(error = %e, "external search failed, keeping local results");
                Vec::new()
            }
        };

        let merged = merge_deduplicated(local_result.passages().to_vec(), external_passages, k);
        RetrievalResult::new(merged, true)
    }

    async fn retrieve_local(
        &self,
        query: &str,
        k: usize,
        filter: Option<&TagFilter>,
    ) -> Vec<Passage> {
        match self.index.query(query, k, filter).await {
            Ok(passages) => passages,
            Err(e) => {
                tracing::warn!(error = %e, "local index query failed, degrading to empty result");
                Vec::new()
            }
        }
    }
}
