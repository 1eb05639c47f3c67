//! Evidence quality gate
//!
//! Scores a retrieved passage set into a confidence tier and decides whether
//! an answer should be attempted at all. Insufficient evidence is not an
//! error: it propagates as `should_answer = false` and becomes a
//! refusal-style prompt downstream.

use crate::config::QualityConfig;
use crate::retrieval::{RetrievalResult, SimilarityFallback};
use serde::{Deserialize, Serialize};

/// Confidence classification of retrieved evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Good,
    Medium,
    Poor,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Good => write!(f, "good"),
            Tier::Medium => write!(f, "medium"),
            Tier::Poor => write!(f, "poor"),
        }
    }
}

/// Outcome of gating one retrieval; derived purely, never persisted
#[derive(Debug, Clone)]
pub struct QualityAssessment {
    pub tier: Tier,
    /// In [0, 1]; max similarity except where the decision table fixes it
    pub confidence: f32,
    pub warning: Option<String>,
    pub should_answer: bool,
}

/// Gate thresholds. The decision table is evaluated top to bottom, first
/// match wins.
pub struct EvidenceGate {
    min_docs: usize,
    min_similarity: f32,
    min_content_chars: usize,
    fallback: SimilarityFallback,
}

/// Confidence reported when evidence exists but is too short to ground an
/// answer. A deliberately low constant, not a measured value.
const SHORT_CONTENT_CONFIDENCE: f32 = 0.4;

impl EvidenceGate {
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            min_docs: config.min_docs,
            min_similarity: config.min_similarity,
            min_content_chars: config.min_content_chars,
            fallback: SimilarityFallback::default(),
        }
    }

    /// Override the no-score similarity heuristic
    pub fn with_fallback(mut self, fallback: SimilarityFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn assess(&self, result: &RetrievalResult, query: &str) -> QualityAssessment {
        if result.is_empty() {
            tracing::debug!(query, "no passages retrieved");
            return QualityAssessment {
                tier: Tier::Poor,
                confidence: 0.0,
                warning: Some("no relevant passages found".to_string()),
                should_answer: false,
            };
        }

        let max_similarity = result.max_similarity(&self.fallback);

        if result.len() < self.min_docs {
            return QualityAssessment {
                tier: Tier::Poor,
                confidence: max_similarity,
                warning: Some(format!(
                    "too few passages retrieved (only {})",
                    result.len()
                )),
                should_answer: false,
            };
        }

        if max_similarity < self.min_similarity {
            return QualityAssessment {
                tier: Tier::Poor,
                confidence: max_similarity,
                warning: Some(format!("relevance too low ({:.2})", max_similarity)),
                should_answer: false,
            };
        }

        if result.combined_content_chars() < self.min_content_chars {
            return QualityAssessment {
                tier: Tier::Poor,
                confidence: SHORT_CONTENT_CONFIDENCE,
                warning: Some("retrieved content too short".to_string()),
                should_answer: false,
            };
        }

        if max_similarity >= 0.8 && result.len() >= 3 {
            return QualityAssessment {
                tier: Tier::Good,
                confidence: max_similarity,
                warning: None,
                should_answer: true,
            };
        }

        if max_similarity >= 0.6 && result.len() >= 2 {
            return QualityAssessment {
                tier: Tier::Medium,
                confidence: max_similarity,
                warning: Some("evidence is limited; the answer may be incomplete".to_string()),
                should_answer: true,
            };
        }

        QualityAssessment {
            tier: Tier::Poor,
            confidence: max_similarity,
            warning: Some("insufficient supporting evidence".to_string()),
            should_answer: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::Passage;

    fn gate() -> EvidenceGate {
        EvidenceGate::new(&QualityConfig::default())
    }

    fn passages(specs: &[(usize, f32)]) -> RetrievalResult {
        let ps = specs
            .iter()
            .enumerate()
            .map(|(i, (len, score))| {
                Passage::new(format!("{:len$}", i, len = *len), "work").with_score(*score)
            })
            .collect();
        RetrievalResult::new(ps, false)
    }

    #[test]
    fn test_empty_result_is_poor() {
        let assessment = gate().assess(&RetrievalResult::empty(), "any question");

        assert_eq!(assessment.tier, Tier::Poor);
        assert_eq!(assessment.confidence, 0.0);
        assert!(!assessment.should_answer);
        assert!(assessment.warning.is_some());
    }

    #[test]
    fn test_single_passage_below_min_docs() {
        // similarity above min_similarity, still poor: minDocs not met
        let result = passages(&[(200, 0.55)]);
        let assessment = gate().assess(&result, "q");

        assert_eq!(assessment.tier, Tier::Poor);
        assert!(!assessment.should_answer);
        assert!((assessment.confidence - 0.55).abs() < f32::EPSILON);
    }

    #[test]
    fn test_low_similarity_is_poor() {
        let result = passages(&[(200, 0.3), (200, 0.45)]);
        let assessment = gate().assess(&result, "q");

        assert_eq!(assessment.tier, Tier::Poor);
        assert!(!assessment.should_answer);
        assert!((assessment.confidence - 0.45).abs() < f32::EPSILON);
    }

    #[test]
    fn test_short_content_fixed_confidence() {
        let result = passages(&[(30, 0.9), (30, 0.9), (30, 0.9)]);
        let assessment = gate().assess(&result, "q");

        assert_eq!(assessment.tier, Tier::Poor);
        assert!(!assessment.should_answer);
        assert!((assessment.confidence - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_good_tier() {
        let result = passages(&[(200, 0.85), (200, 0.7), (200, 0.6)]);
        let assessment = gate().assess(&result, "q");

        assert_eq!(assessment.tier, Tier::Good);
        assert!(assessment.should_answer);
        assert!(assessment.warning.is_none());
        assert!((assessment.confidence - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn test_medium_tier() {
        let result = passages(&[(200, 0.65), (200, 0.5)]);
        let assessment = gate().assess(&result, "q");

        assert_eq!(assessment.tier, Tier::Medium);
        assert!(assessment.should_answer);
        assert!(assessment.warning.is_some());
    }

    #[test]
    fn test_fallback_similarity_without_scores() {
        let ps = (0..3)
            .map(|i| Passage::new(format!("a passage with enough text to count {:050}", i), "w"))
            .collect();
        let result = RetrievalResult::new(ps, false);
        let assessment = gate().assess(&result, "q");

        // three unscored passages assume 0.8, which with count 3 lands good
        assert_eq!(assessment.tier, Tier::Good);
        assert!((assessment.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_table_order_min_docs_before_similarity() {
        // one high-similarity passage: the count rule fires first
        let result = passages(&[(300, 0.95)]);
        let assessment = gate().assess(&result, "q");

        assert!(assessment
            .warning
            .as_deref()
            .is_some_and(|w| w.contains("too few")));
    }
}
