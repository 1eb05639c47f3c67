//! Keyword routing
//!
//! Decides, per query, whether retrieval should take the fast path: queries
//! that name a known topic get a wider fan-out (deeper recall) instead of a
//! narrower, cheaper fetch.

use crate::catalog::TagCatalog;
use crate::config::RetrievalConfig;

/// Flattened keyword set built once at startup; read-only afterwards.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    keywords: Vec<String>,
}

impl KeywordIndex {
    /// Flatten the catalog's per-work, per-category lists plus the generic list
    pub fn from_catalog(catalog: &TagCatalog) -> Self {
        let keywords = catalog.flatten_keywords();
        tracing::debug!(count = keywords.len(), "keyword index built");
        Self { keywords }
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    fn matches<'a>(&'a self, query: &str) -> Vec<&'a str> {
        self.keywords
            .iter()
            .filter(|kw| query.contains(kw.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Routing decision for one query
#[derive(Debug, Clone)]
pub struct RouteDecision {
    /// Whether to use the enhanced retrieval fan-out
    pub fast_path: bool,
    /// Human-readable explanation, names the first three matches
    pub reason: String,
    /// Every matched keyword, for diagnostics
    pub matched: Vec<String>,
}

/// Matches queries against the keyword index via substring containment.
///
/// Case-sensitive by design: catalog keywords are proper names and titles,
/// and the original corpus mixes scripts where lowercasing is meaningless.
pub struct KeywordRouter {
    index: KeywordIndex,
    base_k: usize,
    enhanced_k: usize,
}

impl KeywordRouter {
    pub fn new(catalog: &TagCatalog, config: &RetrievalConfig) -> Self {
        Self {
            index: KeywordIndex::from_catalog(catalog),
            base_k: config.base_k,
            enhanced_k: config.enhanced_k,
        }
    }

    /// Route a query. Pure function: no side effects, no error conditions.
    /// An empty index always yields `fast_path = false`.
    pub fn route(&self, query: &str) -> RouteDecision {
        let matched: Vec<String> = self
            .index
            .matches(query)
            .into_iter()
            .map(str::to_string)
            .collect();

        if matched.is_empty() {
            return RouteDecision {
                fast_path: false,
                reason: "no keyword matched".to_string(),
                matched,
            };
        }

        let mut reason = format!(
            "matched keywords: {}",
            matched
                .iter()
                .take(3)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        if matched.len() > 3 {
            reason.push_str(&format!(" (and {} more)", matched.len() - 3));
        }

        RouteDecision {
            fast_path: true,
            reason,
            matched,
        }
    }

    /// The retrieval fan-out implied by a routing decision
    pub fn fan_out(&self, decision: &RouteDecision) -> usize {
        if decision.fast_path {
            self.enhanced_k
        } else {
            self.base_k
        }
    }

    pub fn keyword_count(&self) -> usize {
        self.index.len()
    }
}
