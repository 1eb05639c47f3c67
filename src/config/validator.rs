use crate::config::Config;
use crate::error::{LoreqaError, Result, ValidationError};

/// Known LLM provider identifiers; "custom" requires an explicit base URL
const KNOWN_PROVIDERS: &[&str] = &["groq", "dashscope", "custom"];

/// Configuration validator: fatal at initialization, never at query time
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_quality(config, &mut errors);
        Self::validate_memory(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_external(config, &mut errors);
        Self::validate_llm(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LoreqaError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.base_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.base_k",
                "Baseline fan-out must be greater than 0",
            ));
        }

        if retrieval.enhanced_k < retrieval.base_k {
            errors.push(ValidationError::new(
                "retrieval.enhanced_k",
                format!(
                    "Enhanced fan-out ({}) must not be below base_k ({})",
                    retrieval.enhanced_k, retrieval.base_k
                ),
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.similarity_threshold) {
            errors.push(ValidationError::new(
                "retrieval.similarity_threshold",
                format!(
                    "Threshold must be within [0, 1], got {}",
                    retrieval.similarity_threshold
                ),
            ));
        }
    }

    fn validate_quality(config: &Config, errors: &mut Vec<ValidationError>) {
        let quality = &config.quality;

        if quality.min_docs == 0 {
            errors.push(ValidationError::new(
                "quality.min_docs",
                "Minimum document count must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&quality.min_similarity) {
            errors.push(ValidationError::new(
                "quality.min_similarity",
                format!(
                    "Minimum similarity must be within [0, 1], got {}",
                    quality.min_similarity
                ),
            ));
        }
    }

    fn validate_memory(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.memory.window == 0 {
            errors.push(ValidationError::new(
                "memory.window",
                "Memory window must be greater than 0",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.index.url.is_empty() {
            errors.push(ValidationError::new(
                "index.url",
                "Vector index URL cannot be empty",
            ));
        }

        if config.index.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "index.timeout_secs",
                "Index timeout must be greater than 0",
            ));
        }
    }

    fn validate_external(config: &Config, errors: &mut Vec<ValidationError>) {
        let external = &config.external;

        if external.enabled && external.url.is_empty() {
            errors.push(ValidationError::new(
                "external.url",
                "External search is enabled but no URL is configured",
            ));
        }

        if external.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "external.timeout_secs",
                "External search timeout must be greater than 0",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        let llm = &config.llm;

        if !KNOWN_PROVIDERS.contains(&llm.provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Unknown provider '{}'; supported: {}",
                    llm.provider,
                    KNOWN_PROVIDERS.join(", ")
                ),
            ));
        }

        if llm.provider == "custom" && llm.base_url.as_deref().unwrap_or("").is_empty() {
            errors.push(ValidationError::new(
                "llm.base_url",
                "Custom provider requires an explicit base URL",
            ));
        }

        if llm.model.is_empty() {
            errors.push(ValidationError::new("llm.model", "Model cannot be empty"));
        }

        if llm.api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "llm.api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }

        if !(0.0..=2.0).contains(&llm.temperature) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be within [0, 2], got {}", llm.temperature),
            ));
        }
    }
}
