//! Configuration management
//!
//! One explicit configuration struct, constructed at startup and passed by
//! reference into each component constructor. Components never read ambient
//! process state; environment overrides are applied here, once, at load.

use crate::error::{LoreqaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub retrieval: RetrievalConfig,
    pub quality: QualityConfig,
    pub memory: MemoryConfig,
    pub index: IndexConfig,
    pub external: ExternalConfig,
    pub llm: LlmConfig,
    pub catalog: CatalogConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Retrieval fan-out and the local-evidence threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Baseline passage count per query
    pub base_k: usize,
    /// Fan-out when the router takes the fast path
    pub enhanced_k: usize,
    /// Local max similarity below which the external endpoint is consulted
    pub similarity_threshold: f32,
}

/// Evidence gate thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Minimum passage count to attempt an answer
    pub min_docs: usize,
    /// Minimum max-similarity to attempt an answer
    pub min_similarity: f32,
    /// Minimum combined evidence length, in characters
    pub min_content_chars: usize,
}

/// Conversation memory window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Exchanges retained; the stored turn cap is twice this
    pub window: usize,
}

/// Local vector index service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub url: String,
    pub timeout_secs: u64,
}

/// External search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    pub enabled: bool,
    pub url: String,
    /// Name of the environment variable holding the bearer token
    pub api_key_env: String,
    pub timeout_secs: u64,
}

/// Language-model service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "groq", "dashscope", or "custom" (with base_url)
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
}

/// Catalog and exemplar file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub works_file: PathBuf,
    pub exemplars_file: PathBuf,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LoreqaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| LoreqaError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| LoreqaError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: LOREQA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("LOREQA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EXTERNAL__ENABLED" => {
                self.external.enabled =
                    value.parse().map_err(|_| LoreqaError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as boolean", value),
                    })?;
            }
            "EXTERNAL__URL" => {
                self.external.url = value.to_string();
            }
            "INDEX__URL" => {
                self.index.url = value.to_string();
            }
            "LLM__PROVIDER" => {
                self.llm.provider = value.to_string();
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "RETRIEVAL__SIMILARITY_THRESHOLD" => {
                self.retrieval.similarity_threshold =
                    value.parse().map_err(|_| LoreqaError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as float", value),
                    })?;
            }
            "MEMORY__WINDOW" => {
                self.memory.window =
                    value.parse().map_err(|_| LoreqaError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| LoreqaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("loreqa").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = PathBuf::from("~/.config/loreqa");

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
            },
            retrieval: RetrievalConfig::default(),
            quality: QualityConfig::default(),
            memory: MemoryConfig::default(),
            index: IndexConfig {
                url: "http://127.0.0.1:7700/query".to_string(),
                timeout_secs: 10,
            },
            external: ExternalConfig::default(),
            llm: LlmConfig::default(),
            catalog: CatalogConfig {
                works_file: config_dir.join("works.toml"),
                exemplars_file: config_dir.join("exemplars.toml"),
            },
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_k: 5,
            enhanced_k: 8,
            similarity_threshold: 0.7,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_docs: 2,
            min_similarity: 0.5,
            min_content_chars: 100,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { window: 5 }
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            api_key_env: "EXTERNAL_SEARCH_API_KEY".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            base_url: None,
            api_key_env: "GROQ_API_KEY".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.1,
        }
    }
}
