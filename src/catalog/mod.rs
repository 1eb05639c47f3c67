//! Tag catalog for the document corpus
//!
//! Maps a source identifier (one work in the corpus) to structured metadata:
//! title, author, era, genre, topical categories, and the keyword lists the
//! router is built from. Pure lookup, read-only after load.

use crate::error::{LoreqaError, Result};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// A tag value attached to a passage: either a single value or a set.
///
/// Category tags are sets ("characters" and "poetry" at once); work, author,
/// era and genre are scalars. Filtering must respect the distinction: a
/// filter value matches a set tag when the set contains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    One(String),
    Many(Vec<String>),
}

impl TagValue {
    /// Whether this tag value matches a filter value
    pub fn matches(&self, value: &str) -> bool {
        match self {
            TagValue::One(v) => v == value,
            TagValue::Many(vs) => vs.iter().any(|v| v == value),
        }
    }
}

/// A structured constraint on vector-index queries: one field, one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagFilter {
    pub field: String,
    pub value: String,
}

impl TagFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether a passage's tag map satisfies this filter
    pub fn matches(&self, tags: &HashMap<String, TagValue>) -> bool {
        tags.get(&self.field).is_some_and(|v| v.matches(&self.value))
    }
}

/// Metadata for one work in the corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkEntry {
    pub title: String,
    pub author: String,
    pub era: String,
    pub genre: String,
    /// Topical categories this work's passages are tagged with
    #[serde(default)]
    pub categories: Vec<String>,
    /// Per-category keyword lists, flattened into the router's index
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,
}

impl WorkEntry {
    /// Render this entry as the tag map its passages carry
    pub fn tags(&self, id: &str) -> HashMap<String, TagValue> {
        let mut tags = HashMap::new();
        tags.insert("work".to_string(), TagValue::One(id.to_string()));
        tags.insert("author".to_string(), TagValue::One(self.author.clone()));
        tags.insert("era".to_string(), TagValue::One(self.era.clone()));
        tags.insert("genre".to_string(), TagValue::One(self.genre.clone()));
        tags.insert(
            "category".to_string(),
            TagValue::Many(self.categories.clone()),
        );
        tags
    }
}

/// The tag catalog: every known work plus corpus-wide generic keywords
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCatalog {
    /// Works keyed by source identifier
    #[serde(default)]
    pub works: BTreeMap<String, WorkEntry>,

    /// Keywords that indicate corpus topics without naming a specific work
    #[serde(default)]
    pub generic_keywords: Vec<String>,
}

impl TagCatalog {
    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LoreqaError::Io {
            source: e,
            context: format!("Failed to read catalog file: {:?}", path),
        })?;
        let catalog: TagCatalog = toml::from_str(&content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Reject structurally broken catalogs at startup, never at query time
    pub fn validate(&self) -> Result<()> {
        for (id, work) in &self.works {
            if id.is_empty() {
                return Err(LoreqaError::Catalog("empty work identifier".to_string()));
            }
            if work.title.is_empty() {
                return Err(LoreqaError::Catalog(format!("work '{}' has no title", id)));
            }
            for category in work.keywords.keys() {
                if !work.categories.contains(category) {
                    return Err(LoreqaError::Catalog(format!(
                        "work '{}' has keywords for undeclared category '{}'",
                        id, category
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up one work by source identifier
    pub fn work(&self, id: &str) -> Option<&WorkEntry> {
        self.works.get(id)
    }

    /// All known source identifiers
    pub fn work_ids(&self) -> impl Iterator<Item = &str> {
        self.works.keys().map(String::as_str)
    }

    /// Build a work-scoped filter, rejecting identifiers the catalog does not know
    pub fn work_filter(&self, id: &str) -> Result<TagFilter> {
        if self.works.contains_key(id) {
            Ok(TagFilter::new("work", id))
        } else {
            Err(LoreqaError::UnknownWork { id: id.to_string() })
        }
    }

    /// Flatten every per-work, per-category keyword list plus the generic
    /// list into one deduplicated set. Built once at startup; the router
    /// holds the result for the process lifetime.
    pub fn flatten_keywords(&self) -> Vec<String> {
        let mut seen: AHashSet<&str> = AHashSet::new();
        let mut flat = Vec::new();

        for work in self.works.values() {
            for words in work.keywords.values() {
                for word in words {
                    if seen.insert(word.as_str()) {
                        flat.push(word.clone());
                    }
                }
            }
        }

        for word in &self.generic_keywords {
            if seen.insert(word.as_str()) {
                flat.push(word.clone());
            }
        }

        flat
    }
}

impl Default for TagCatalog {
    /// Built-in catalog for the four great classical novels, the corpus the
    /// engine ships against. Replaceable via `catalog.works_file`.
    fn default() -> Self {
        toml::from_str(include_str!("../../config-templates/works.toml"))
            .unwrap_or_else(|_| TagCatalog {
                works: BTreeMap::new(),
                generic_keywords: Vec::new(),
            })
    }
}
