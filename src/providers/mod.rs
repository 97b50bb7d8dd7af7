//! Provider traits for the external models the engine consumes
//!
//! The engine never talks to a network itself; embedding, summarization, and
//! question answering are injected behind these traits and replaced wholesale
//! by test doubles. Deterministic offline implementations are provided for
//! use without any hosted model.

use std::sync::Arc;
use thiserror::Error;

mod offline;
mod retry;

pub use offline::{ExtractiveQa, ExtractiveSummarizer, HashEmbedder};
pub(crate) use offline::extractive_summary;
pub use retry::with_retries;

/// Errors surfaced by embedding, summarization, and QA providers
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("provider call timed out")]
    Timeout,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl ProviderError {
    /// Transient failures are retried with backoff; everything else is
    /// surfaced immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout | ProviderError::RateLimited(_) | ProviderError::Network(_)
        )
    }
}

/// Trait for embedding providers
///
/// Maps a string to a dense vector of a fixed, model-specific dimension.
/// Implementations must be deterministic for a fixed provider version.
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Trait for summarization providers
///
/// Maps an ordered list of texts to one summary bounded by a token budget.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, texts: &[String], max_tokens: usize) -> Result<String, ProviderError>;
}

/// Trait for question-answering providers
pub trait QaModel: Send + Sync {
    fn answer(&self, context: &str, question: &str) -> Result<String, ProviderError>;
}

/// The full provider set injected into the engine
#[derive(Clone)]
pub struct ProviderSet {
    pub embedder: Arc<dyn Embedder>,
    pub summarizer: Arc<dyn Summarizer>,
    pub qa: Arc<dyn QaModel>,
}

impl ProviderSet {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn Summarizer>,
        qa: Arc<dyn QaModel>,
    ) -> Self {
        Self {
            embedder,
            summarizer,
            qa,
        }
    }

    /// Deterministic offline providers: hashed bag-of-words embeddings,
    /// extractive summaries, extractive answers. No network, no model files.
    pub fn offline() -> Self {
        Self {
            embedder: Arc::new(HashEmbedder::default()),
            summarizer: Arc::new(ExtractiveSummarizer),
            qa: Arc::new(ExtractiveQa),
        }
    }
}
