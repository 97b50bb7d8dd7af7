//! Configuration management for fintree
//!
//! Loading, validation, and defaults for every knob the engine recognises.
//! Values come from a TOML file, with `FINTREE_*` environment variables
//! applied on top and the whole result validated eagerly.

use crate::error::{FintreeError, Result};
use crate::retrieval::RetrievalMethod;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in whitespace tokens
    pub chunk_size: usize,
    /// Token overlap between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

/// Tree building configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum interior level (the root lives at most here)
    pub max_depth: usize,
    /// Metadata groups larger than this are sub-clustered by embedding
    pub max_cluster_size: usize,
    /// Sub-clusters smaller than this are absorbed into a neighbour
    pub min_cluster_size: usize,
    /// Target dimensionality for the reduction step
    pub reduction_dimension: usize,
    /// Cap on the number of components in the BIC search
    pub max_clusters: usize,
    /// Seed fixing sub-clustering determinism
    pub gaussian_random_state: u64,
    /// Token budget handed to the summarizer
    pub summarization_length: usize,
    /// Fields defining the fixed hierarchy, outermost first
    pub metadata_keys: Vec<String>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_cluster_size: 100,
            min_cluster_size: 5,
            reduction_dimension: 10,
            max_clusters: 5,
            gaussian_random_state: 42,
            summarization_length: 200,
            metadata_keys: vec![
                "sector".to_string(),
                "company".to_string(),
                "year".to_string(),
            ],
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default retrieval cap
    pub top_k: usize,
    /// Default traversal method
    pub traversal_method: RetrievalMethod,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            traversal_method: RetrievalMethod::Hierarchical,
        }
    }
}

/// Provider call configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Concurrent provider requests per level
    pub parallelism: usize,
    /// Per-call timeout, handed to provider constructors
    pub timeout_seconds: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            parallelism: 8,
            timeout_seconds: 60,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FintreeError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FintreeError::Io {
            source: e,
            context: format!("Failed to read config file: {}", path.display()),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from a file if given, otherwise use defaults with env overrides.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Config::default();
                config.apply_env_overrides();
                ConfigValidator::validate(&config)?;
                Ok(config)
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| FintreeError::Io {
            source: e,
            context: format!("Failed to write config file: {}", path.display()),
        })?;
        Ok(())
    }

    /// Apply `FINTREE_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        apply_usize("FINTREE_CHUNK_SIZE", &mut self.chunking.chunk_size);
        apply_usize("FINTREE_CHUNK_OVERLAP", &mut self.chunking.chunk_overlap);
        apply_usize("FINTREE_MAX_DEPTH", &mut self.tree.max_depth);
        apply_usize("FINTREE_MAX_CLUSTER_SIZE", &mut self.tree.max_cluster_size);
        apply_usize("FINTREE_MIN_CLUSTER_SIZE", &mut self.tree.min_cluster_size);
        apply_usize(
            "FINTREE_SUMMARIZATION_LENGTH",
            &mut self.tree.summarization_length,
        );
        apply_usize("FINTREE_TOP_K", &mut self.retrieval.top_k);
        apply_usize(
            "FINTREE_PROVIDER_PARALLELISM",
            &mut self.providers.parallelism,
        );

        if let Ok(value) = std::env::var("FINTREE_TRAVERSAL_METHOD") {
            match value.parse() {
                Ok(method) => self.retrieval.traversal_method = method,
                Err(_) => warn!(%value, "ignoring invalid FINTREE_TRAVERSAL_METHOD"),
            }
        }
    }
}

fn apply_usize(var: &str, slot: &mut usize) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => warn!(var, %value, "ignoring invalid environment override"),
        }
    }
}
