//! Exemplar selection
//!
//! Classifies a query's rhetorical type and supplies matched few-shot
//! examples so answers follow a consistent style. Classification is a pure
//! keyword-family match; selection falls back to one exemplar per category
//! when the query is unclassified.

use crate::error::{LoreqaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Rhetorical category of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// "Who is X", biography, introduction
    Identity,
    /// Two entities joined by a conjunction plus a relation noun
    Relationship,
    /// Story, plot, causation
    Narrative,
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKind::Identity => write!(f, "identity"),
            QueryKind::Relationship => write!(f, "relationship"),
            QueryKind::Narrative => write!(f, "narrative"),
        }
    }
}

/// A worked question/answer pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exemplar {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub answer: String,
}

/// Identity cues: asking who or what someone is
const IDENTITY_CUES: &[&str] = &[
    "who is",
    "who was",
    "who are",
    "what kind of person",
    "introduce",
    "tell me about",
    "biography of",
];

/// Conjunctions that join two entities
const CONJUNCTION_CUES: &[&str] = &[" and ", " with ", " between "];

/// Relation nouns; a relationship query needs one of these plus a conjunction
const RELATION_CUES: &[&str] = &["relationship", "relation", "related", "connection"];

/// Narrative and causal cues
const NARRATIVE_CUES: &[&str] = &[
    "story",
    "plot",
    "what happened",
    "what happens",
    "how did",
    "how does",
    "why did",
    "why does",
];

/// Exemplar sets per category, loaded from TOML or compiled-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExemplarLibrary {
    #[serde(default)]
    identity: Vec<Exemplar>,
    #[serde(default)]
    relationship: Vec<Exemplar>,
    #[serde(default)]
    narrative: Vec<Exemplar>,
}

impl ExemplarLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LoreqaError::Io {
            source: e,
            context: format!("Failed to read exemplar file: {:?}", path),
        })?;
        let library: ExemplarLibrary = toml::from_str(&content)?;
        Ok(library)
    }

    fn category(&self, kind: QueryKind) -> &[Exemplar] {
        match kind {
            QueryKind::Identity => &self.identity,
            QueryKind::Relationship => &self.relationship,
            QueryKind::Narrative => &self.narrative,
        }
    }

    /// Categories that actually hold exemplars, in stable order
    fn populated(&self) -> BTreeMap<QueryKind, &[Exemplar]> {
        [
            QueryKind::Identity,
            QueryKind::Relationship,
            QueryKind::Narrative,
        ]
        .into_iter()
        .filter_map(|kind| {
            let exemplars = self.category(kind);
            (!exemplars.is_empty()).then_some((kind, exemplars))
        })
        .collect()
    }

    pub fn total(&self) -> usize {
        self.identity.len() + self.relationship.len() + self.narrative.len()
    }
}

impl Default for ExemplarLibrary {
    fn default() -> Self {
        toml::from_str(include_str!("../../config-templates/exemplars.toml")).unwrap_or(Self {
            identity: Vec::new(),
            relationship: Vec::new(),
            narrative: Vec::new(),
        })
    }
}

/// Classifies queries and selects style exemplars
pub struct ExemplarSelector {
    library: ExemplarLibrary,
}

impl ExemplarSelector {
    pub fn new(library: ExemplarLibrary) -> Self {
        Self { library }
    }

    /// Classify a query into one of the three disjoint cue families.
    /// First matching family wins; deterministic for a given query.
    pub fn classify(&self, query: &str) -> Option<QueryKind> {
        let lowered = query.to_lowercase();

        if IDENTITY_CUES.iter().any(|cue| lowered.contains(cue)) {
            return Some(QueryKind::Identity);
        }

        let has_conjunction = CONJUNCTION_CUES.iter().any(|cue| lowered.contains(cue));
        let has_relation_noun = RELATION_CUES.iter().any(|cue| lowered.contains(cue));
        if has_conjunction && has_relation_noun {
            return Some(QueryKind::Relationship);
        }

        if NARRATIVE_CUES.iter().any(|cue| lowered.contains(cue)) {
            return Some(QueryKind::Narrative);
        }

        None
    }

    /// Select exemplars for a classified query. With no category, returns
    /// one exemplar from each known category up to the cap, so unclassified
    /// queries still get baseline style grounding.
    pub fn select(&self, kind: Option<QueryKind>, max_per_category: usize) -> Vec<Exemplar> {
        match kind {
            Some(kind) => self
                .library
                .category(kind)
                .iter()
                .take(max_per_category)
                .cloned()
                .collect(),
            None => self
                .library
                .populated()
                .values()
                .filter_map(|exemplars| exemplars.first())
                .take(max_per_category)
                .cloned()
                .collect(),
        }
    }

    pub fn library(&self) -> &ExemplarLibrary {
        &self.library
    }
}
