//! The engine facade
//!
//! Composes chunker, tree builder, retriever, and storage behind five
//! operations: `add_documents`, `query`, `save`, `load`, `statistics`.
//! The built tree is published by a single assignment under a write lock, so
//! concurrent queries observe either the old tree or the new one, never a
//! partially built one.

use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{info, warn};

use crate::chunking::{Chunker, DocumentFacts};
use crate::config::{Config, ConfigValidator};
use crate::error::{FintreeError, Result};
use crate::providers::{with_retries, ProviderSet};
use crate::retrieval::{QueryResponse, RetrievalOptions, Retriever};
use crate::storage::TreeStore;
use crate::tree::{CancelToken, Tree, TreeBuilder, TreeStatistics};

/// One document handed to `add_documents`. Caller-supplied metadata overrides
/// regex extraction field-by-field.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub text: String,
    pub metadata: Option<DocumentFacts>,
}

impl DocumentInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(text: impl Into<String>, metadata: DocumentFacts) -> Self {
        Self {
            text: text.into(),
            metadata: Some(metadata),
        }
    }
}

impl From<&str> for DocumentInput {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// What a build produced
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped_chunks: usize,
    pub total_nodes: usize,
    pub tree_depth: usize,
}

/// Hierarchical RAG engine over financial report corpora
pub struct Engine {
    config: Config,
    providers: ProviderSet,
    chunker: Chunker,
    tree: RwLock<Option<Arc<Tree>>>,
}

impl Engine {
    pub fn new(config: Config, providers: ProviderSet) -> Result<Self> {
        ConfigValidator::validate(&config)?;
        let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap);
        Ok(Self {
            config,
            providers,
            chunker,
            tree: RwLock::new(None),
        })
    }

    /// Engine with the deterministic offline provider set
    pub fn offline(config: Config) -> Result<Self> {
        Self::new(config, ProviderSet::offline())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshot of the currently published tree, if any
    pub fn tree(&self) -> Option<Arc<Tree>> {
        self.tree.read().unwrap().clone()
    }

    /// Chunk, embed, cluster, and summarize the corpus into a fresh tree,
    /// replacing any previously published tree. On error the previous tree
    /// stays in effect.
    pub fn add_documents(&self, documents: &[DocumentInput]) -> Result<BuildReport> {
        self.add_documents_with_cancel(documents, CancelToken::new())
    }

    pub fn add_documents_with_cancel(
        &self,
        documents: &[DocumentInput],
        cancel: CancelToken,
    ) -> Result<BuildReport> {
        if documents.is_empty() {
            return Err(FintreeError::EmptyCorpus);
        }

        let mut chunks = Vec::new();
        for (doc_index, document) in documents.iter().enumerate() {
            chunks.extend(self.chunker.chunk_document(
                doc_index,
                &document.text,
                document.metadata.as_ref(),
            ));
        }
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "corpus chunked"
        );

        let builder = TreeBuilder::new(&self.config, &self.providers)?.with_cancel_token(cancel);
        let tree = builder.build(&chunks)?;

        let stats = tree.statistics();
        let report = BuildReport {
            documents: documents.len(),
            chunks: chunks.len(),
            skipped_chunks: tree.warnings().len(),
            total_nodes: stats.total_nodes,
            tree_depth: stats.tree_depth,
        };

        *self.tree.write().unwrap() = Some(Arc::new(tree));
        Ok(report)
    }

    /// Answer a question using the configured defaults for method and k
    pub fn query(&self, question: &str) -> Result<QueryResponse> {
        self.query_with(
            question,
            RetrievalOptions::new(
                self.config.retrieval.top_k,
                self.config.retrieval.traversal_method,
            ),
        )
    }

    pub fn query_with(&self, question: &str, options: RetrievalOptions) -> Result<QueryResponse> {
        if options.k == 0 {
            return Err(FintreeError::Config(
                "retrieval k must be greater than 0".to_string(),
            ));
        }

        let tree = self.tree().ok_or(FintreeError::TreeNotBuilt)?;
        if tree.is_empty() {
            return Err(FintreeError::TreeNotBuilt);
        }

        let query_embedding = with_retries("query", || self.providers.embedder.embed(question))
            .map_err(FintreeError::QueryEmbedding)?;
        if query_embedding.len() != tree.dimension() {
            return Err(FintreeError::DimensionMismatch {
                expected: tree.dimension(),
                actual: query_embedding.len(),
            });
        }

        let retriever = Retriever::new(&tree);
        let results = retriever.retrieve(&query_embedding, &options);
        let context = retriever.assemble_context(&results);
        let retrieved_nodes = retriever.previews(&results);

        let answer = if results.is_empty() {
            String::new()
        } else {
            match with_retries("qa", || self.providers.qa.answer(&context, question)) {
                Ok(answer) => answer,
                Err(err) => {
                    warn!(error = %err, "qa provider failed, returning retrieved nodes only");
                    format!("[answer unavailable: {err}]")
                }
            }
        };

        Ok(QueryResponse {
            answer,
            context,
            question: question.to_string(),
            retrieved_nodes,
            retrieval_method: options.method,
        })
    }

    /// Persist the published tree under `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let tree = self.tree().ok_or(FintreeError::TreeNotBuilt)?;
        TreeStore::new(path).save(&tree, &self.config)
    }

    /// Restore a tree from `path` without calling any provider. Rejects a
    /// snapshot whose embedding dimension differs from the injected
    /// embedder's.
    pub fn load(&self, path: &Path) -> Result<()> {
        let (tree, manifest) = TreeStore::new(path).load()?;

        let embedder_dim = self.providers.embedder.dimension();
        if manifest.dimension != embedder_dim {
            return Err(FintreeError::DimensionMismatch {
                expected: manifest.dimension,
                actual: embedder_dim,
            });
        }

        *self.tree.write().unwrap() = Some(Arc::new(tree));
        Ok(())
    }

    pub fn statistics(&self) -> Result<TreeStatistics> {
        self.tree()
            .map(|tree| tree.statistics())
            .ok_or(FintreeError::TreeNotBuilt)
    }
}
