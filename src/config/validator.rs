use crate::config::Config;
use crate::error::{FintreeError, Result, ValidationError};

/// Recognised metadata fields, outermost hierarchy level first
pub const KNOWN_METADATA_KEYS: [&str; 3] = ["sector", "company", "year"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_chunking(config, &mut errors);
        Self::validate_tree(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_providers(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FintreeError::ConfigValidation { errors })
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.chunking.chunk_size == 0 {
            errors.push(ValidationError::new(
                "chunking.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if config.chunking.chunk_overlap >= config.chunking.chunk_size {
            errors.push(ValidationError::new(
                "chunking.chunk_overlap",
                format!(
                    "Overlap ({}) must be smaller than chunk size ({})",
                    config.chunking.chunk_overlap, config.chunking.chunk_size
                ),
            ));
        }
    }

    fn validate_tree(config: &Config, errors: &mut Vec<ValidationError>) {
        let tree = &config.tree;

        if tree.max_depth == 0 || tree.max_depth > 4 {
            errors.push(ValidationError::new(
                "tree.max_depth",
                format!("Max depth must be in 1..=4, got {}", tree.max_depth),
            ));
        }

        if tree.min_cluster_size == 0 {
            errors.push(ValidationError::new(
                "tree.min_cluster_size",
                "Minimum cluster size must be greater than 0",
            ));
        }

        if tree.max_cluster_size < tree.min_cluster_size {
            errors.push(ValidationError::new(
                "tree.max_cluster_size",
                format!(
                    "Max cluster size ({}) must be at least min cluster size ({})",
                    tree.max_cluster_size, tree.min_cluster_size
                ),
            ));
        }

        if tree.reduction_dimension == 0 {
            errors.push(ValidationError::new(
                "tree.reduction_dimension",
                "Reduction dimension must be greater than 0",
            ));
        }

        if tree.max_clusters == 0 {
            errors.push(ValidationError::new(
                "tree.max_clusters",
                "Max clusters must be greater than 0",
            ));
        }

        if tree.summarization_length == 0 {
            errors.push(ValidationError::new(
                "tree.summarization_length",
                "Summarization length must be greater than 0",
            ));
        }

        if tree.metadata_keys.is_empty() {
            errors.push(ValidationError::new(
                "tree.metadata_keys",
                "At least one metadata key is required",
            ));
        }

        for key in &tree.metadata_keys {
            if !KNOWN_METADATA_KEYS.contains(&key.as_str()) {
                errors.push(ValidationError::new(
                    "tree.metadata_keys",
                    format!(
                        "Unknown metadata key '{}' (known: {})",
                        key,
                        KNOWN_METADATA_KEYS.join(", ")
                    ),
                ));
            }
        }

        let mut seen = Vec::new();
        for key in &tree.metadata_keys {
            if seen.contains(&key) {
                errors.push(ValidationError::new(
                    "tree.metadata_keys",
                    format!("Duplicate metadata key '{}'", key),
                ));
            }
            seen.push(key);
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }
    }

    fn validate_providers(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.providers.parallelism == 0 {
            errors.push(ValidationError::new(
                "providers.parallelism",
                "Parallelism must be greater than 0",
            ));
        }

        if config.providers.timeout_seconds == 0 {
            errors.push(ValidationError::new(
                "providers.timeout_seconds",
                "Timeout must be greater than 0",
            ));
        }
    }
}
