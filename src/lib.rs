//! fintree - Hierarchical RAG for Financial Reports
//!
//! Ingests long, structured financial documents, builds a five-level
//! metadata-aware summary tree over their chunks (grouping by sector, company,
//! and year before falling back to embedding similarity), and answers
//! questions by scoring tree nodes against a query embedding and handing the
//! winning context to a QA provider.

pub mod chunking;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod tree;

mod text;

pub use config::Config;
pub use engine::{BuildReport, DocumentInput, Engine};
pub use error::{FintreeError, Result};
pub use providers::{Embedder, ProviderError, ProviderSet, QaModel, Summarizer};
pub use retrieval::{QueryResponse, RetrievalMethod, RetrievalOptions, RetrievedNode};
pub use tree::{CancelToken, MetaValue, Node, NodeId, NodeMetadata, Tree, TreeStatistics};
