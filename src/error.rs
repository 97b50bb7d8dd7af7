use std::path::PathBuf;
use thiserror::Error;

use crate::providers::ProviderError;

/// Main error type for the fintree engine
#[derive(Error, Debug)]
pub enum FintreeError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// A provider call failed permanently or exhausted its retries
    #[error("Provider failure on {item}: {source}")]
    Provider {
        item: String,
        #[source]
        source: ProviderError,
    },

    /// The query embedding could not be produced
    #[error("Query embedding failed: {0}")]
    QueryEmbedding(#[source] ProviderError),

    /// No non-empty chunks were produced from the corpus
    #[error("Empty corpus: no non-empty chunks to index")]
    EmptyCorpus,

    /// Query, save, or statistics requested before a build
    #[error("Tree not built")]
    TreeNotBuilt,

    /// No persisted index at the given path
    #[error("Index not found at {path}")]
    IndexNotFound { path: PathBuf },

    /// Persisted snapshot disagrees with its manifest
    #[error("Snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    /// Loaded index dimension differs from the injected embedder
    #[error("Embedding dimension mismatch: index has {expected}, embedder produces {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Build was cancelled cooperatively; the partial tree was discarded
    #[error("Build cancelled")]
    BuildCancelled,

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Binary snapshot errors
    #[error("Binary snapshot error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for fintree operations
pub type Result<T> = std::result::Result<T, FintreeError>;
