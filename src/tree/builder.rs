//! Tree construction
//!
//! Levels are built strictly one after another: level L's node list is fully
//! realised before any level L+1 work starts. Within a level, provider calls
//! fan out on a bounded pool and results are assembled by cluster index, so
//! completion order never influences the tree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::chunking::Chunk;
use crate::cluster::Clusterer;
use crate::config::Config;
use crate::error::{FintreeError, Result};
use crate::providers::{with_retries, ProviderError, ProviderSet};
use crate::tree::{MetaValue, Node, NodeId, NodeMetadata, Tree};

/// Cooperative cancellation flag, observed at cluster boundaries. In-flight
/// provider calls are allowed to finish; the partial tree is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Builds a tree from chunks using the injected providers
pub struct TreeBuilder<'a> {
    config: &'a Config,
    providers: &'a ProviderSet,
    pool: rayon::ThreadPool,
    cancel: CancelToken,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(config: &'a Config, providers: &'a ProviderSet) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.providers.parallelism)
            .build()
            .map_err(|e| FintreeError::Config(format!("provider pool: {e}")))?;
        Ok(Self {
            config,
            providers,
            pool,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build the full tree. Returns an error (and publishes nothing) on
    /// empty corpus, provider exhaustion, or cancellation.
    pub fn build(&self, chunks: &[Chunk]) -> Result<Tree> {
        let dimension = self.providers.embedder.dimension();
        let mut tree = Tree::new(dimension);

        let mut kept: Vec<&Chunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.text.trim().is_empty() {
                tree.push_warning(format!(
                    "skipped empty chunk {} of document {}",
                    chunk.chunk_index, chunk.doc_index
                ));
            } else {
                kept.push(chunk);
            }
        }
        if kept.is_empty() {
            return Err(FintreeError::EmptyCorpus);
        }

        // Level 0: embed every chunk, keyed by position.
        let embeddings: Vec<Vec<f32>> = self.pool.install(|| {
            kept.par_iter()
                .map(|chunk| {
                    if self.cancel.is_cancelled() {
                        return Err(FintreeError::BuildCancelled);
                    }
                    let id = NodeId::leaf(chunk.doc_index, chunk.chunk_index);
                    self.embed_text(&chunk.text, &id)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        for (position, (chunk, embedding)) in kept.iter().zip(embeddings).enumerate() {
            tree.insert(Node {
                id: NodeId::leaf(chunk.doc_index, chunk.chunk_index),
                text: chunk.text.clone(),
                embedding,
                level: 0,
                children: Vec::new(),
                parent: None,
                metadata: NodeMetadata::leaf(
                    &chunk.facts.sector,
                    &chunk.facts.company,
                    &chunk.facts.year,
                    position,
                ),
            });
        }
        info!(
            leaves = tree.level(0).len(),
            skipped = tree.warnings().len(),
            "level 0 built"
        );

        let clusterer = Clusterer::new(&self.config.tree);

        for level in 1..=self.config.tree.max_depth {
            let prev_ids: Vec<NodeId> = tree.level(level - 1).to_vec();
            let pending = {
                let prev_nodes: Vec<&Node> = prev_ids
                    .iter()
                    .map(|id| tree.node(id).expect("level index resolves"))
                    .collect();

                let clusters = clusterer.cluster(&prev_nodes, level);
                debug!(level, clusters = clusters.len(), "clustered");

                let drafts: Vec<(String, Vec<f32>)> = self.pool.install(|| {
                    clusters
                        .par_iter()
                        .enumerate()
                        .map(|(cluster_idx, cluster)| {
                            if self.cancel.is_cancelled() {
                                return Err(FintreeError::BuildCancelled);
                            }
                            let id = NodeId::cluster(level, cluster_idx);
                            let texts: Vec<String> = cluster
                                .members
                                .iter()
                                .map(|&i| prev_nodes[i].text.clone())
                                .collect();
                            let summary = self.summarize_cluster(&texts, &id)?;
                            let embedding = self.embed_text(&summary, &id)?;
                            Ok((summary, embedding))
                        })
                        .collect::<Result<Vec<_>>>()
                })?;

                clusters
                    .iter()
                    .zip(drafts)
                    .enumerate()
                    .map(|(cluster_idx, (cluster, (summary, embedding)))| {
                        let children: Vec<&Node> =
                            cluster.members.iter().map(|&i| prev_nodes[i]).collect();
                        let mut metadata =
                            inherit_metadata(&children, level, &self.config.tree.metadata_keys);
                        metadata.cluster_idx = cluster_idx;
                        let child_ids: Vec<NodeId> =
                            cluster.members.iter().map(|&i| prev_ids[i].clone()).collect();
                        (
                            NodeId::cluster(level, cluster_idx),
                            summary,
                            embedding,
                            child_ids,
                            metadata,
                        )
                    })
                    .collect::<Vec<_>>()
            };

            for (id, summary, embedding, child_ids, metadata) in pending {
                tree.insert(Node {
                    id: id.clone(),
                    text: summary,
                    embedding,
                    level,
                    children: Vec::new(),
                    parent: None,
                    metadata,
                });
                for child in &child_ids {
                    tree.link(&id, child);
                }
            }

            let produced = tree.level(level).len();
            info!(level, nodes = produced, "level built");
            if produced == 1 {
                // Root reached; remaining levels are skipped.
                break;
            }
        }

        Ok(tree)
    }

    fn embed_text(&self, text: &str, id: &NodeId) -> Result<Vec<f32>> {
        let embedding = with_retries(id.as_str(), || self.providers.embedder.embed(text))
            .map_err(|source| FintreeError::Provider {
                item: id.to_string(),
                source,
            })?;

        let expected = self.providers.embedder.dimension();
        if embedding.len() != expected {
            return Err(FintreeError::Provider {
                item: id.to_string(),
                source: ProviderError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                },
            });
        }
        Ok(embedding)
    }

    /// Summarize one cluster. Exhausted retries and empty summaries fall back
    /// to the deterministic extractive summary; permanent provider errors
    /// surface.
    fn summarize_cluster(&self, texts: &[String], id: &NodeId) -> Result<String> {
        let budget = self.config.tree.summarization_length;
        match with_retries(id.as_str(), || {
            self.providers.summarizer.summarize(texts, budget)
        }) {
            Ok(summary) if !summary.trim().is_empty() => Ok(summary),
            Ok(_) => {
                warn!(%id, "provider returned an empty summary, using extractive fallback");
                Ok(crate::providers::extractive_summary(texts, budget))
            }
            Err(err) if err.is_transient() => {
                warn!(%id, error = %err, "summarizer retries exhausted, using extractive fallback");
                Ok(crate::providers::extractive_summary(texts, budget))
            }
            Err(source) => Err(FintreeError::Provider {
                item: id.to_string(),
                source,
            }),
        }
    }
}

/// Metadata for a parent from its children: fields the target level squashes
/// become `"all"`; the rest take the most common child value, with
/// `"unknown"` votes discarded and ties broken by first appearance in child
/// order. `cluster_idx` is filled in by the caller.
pub fn inherit_metadata(children: &[&Node], level: usize, metadata_keys: &[String]) -> NodeMetadata {
    let keys_used = metadata_keys.len().saturating_sub(level - 1);

    let mut metadata = NodeMetadata {
        sector: MetaValue::Unknown,
        company: MetaValue::Unknown,
        year: MetaValue::Unknown,
        num_children: children.len(),
        cluster_idx: 0,
    };

    for field in ["sector", "company", "year"] {
        let value = match metadata_keys.iter().position(|k| k == field) {
            Some(position) if position >= keys_used => MetaValue::All,
            _ => majority_vote(children, field),
        };
        metadata.set_field(field, value);
    }
    metadata
}

fn majority_vote(children: &[&Node], field: &str) -> MetaValue {
    let mut counts: Vec<(&MetaValue, usize)> = Vec::new();
    for child in children {
        let value = child.metadata.field(field);
        if value.is_unknown() {
            continue;
        }
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some(entry) => entry.1 += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(&MetaValue, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.clone())
        .unwrap_or(MetaValue::Unknown)
}
