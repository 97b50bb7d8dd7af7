//! Retrieval over a built tree
//!
//! Two complementary strategies: hierarchical traversal walks from the root
//! and keeps the best children at every level, mixing abstraction levels in
//! the result; flattened search scores every node in the tree so leaf chunks
//! compete directly with summaries. Both score by cosine similarity against
//! one query embedding and cap output at the caller's k.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FintreeError;
use crate::tree::{Node, NodeId, Tree};

/// Characters of node text included in previews
const PREVIEW_CHARS: usize = 200;

/// Which traversal the retriever runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    /// Root-down frontier descent; preferred for broad questions
    Hierarchical,
    /// Union of all levels; preferred for precise factual questions
    Flattened,
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMethod::Hierarchical => f.write_str("hierarchical"),
            RetrievalMethod::Flattened => f.write_str("flattened"),
        }
    }
}

impl FromStr for RetrievalMethod {
    type Err = FintreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hierarchical" => Ok(RetrievalMethod::Hierarchical),
            "flattened" => Ok(RetrievalMethod::Flattened),
            other => Err(FintreeError::Config(format!(
                "unknown retrieval method '{other}' (expected hierarchical or flattened)"
            ))),
        }
    }
}

/// Per-call retrieval knobs
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub k: usize,
    pub method: RetrievalMethod,
    /// Children retained per level during hierarchical descent; defaults to k
    pub k_per_level: Option<usize>,
    /// Flattened-search score multipliers indexed by level; defaults to 1.0
    pub level_weights: Option<Vec<f32>>,
}

impl RetrievalOptions {
    pub fn new(k: usize, method: RetrievalMethod) -> Self {
        Self {
            k,
            method,
            k_per_level: None,
            level_weights: None,
        }
    }
}

/// One scored result node
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub id: NodeId,
    pub level: usize,
    pub score: f32,
}

/// Inspection view of one retrieved node
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedNode {
    pub id: NodeId,
    pub level: usize,
    pub score: f32,
    pub text_preview: String,
}

/// The full answer object returned by the engine
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub context: String,
    pub question: String,
    pub retrieved_nodes: Vec<RetrievedNode>,
    pub retrieval_method: RetrievalMethod,
}

/// Scores tree nodes against a query embedding
pub struct Retriever<'a> {
    tree: &'a Tree,
}

impl<'a> Retriever<'a> {
    pub fn new(tree: &'a Tree) -> Self {
        Self { tree }
    }

    /// Ranked, deduplicated nodes under the caller's cap. Identical calls on
    /// an unchanged tree return identical ordered results.
    pub fn retrieve(&self, query: &[f32], options: &RetrievalOptions) -> Vec<ScoredNode> {
        if self.tree.is_empty() {
            return Vec::new();
        }
        let mut results = match options.method {
            RetrievalMethod::Hierarchical => self.hierarchical(query, options),
            RetrievalMethod::Flattened => self.flattened(query, options),
        };
        sort_by_score(&mut results);
        results.truncate(options.k);
        results
    }

    /// Frontier descent from the root: score every child of every frontier
    /// node, keep the top `k_per_level`, and repeat on the retained children.
    /// The root itself is never part of the result set.
    fn hierarchical(&self, query: &[f32], options: &RetrievalOptions) -> Vec<ScoredNode> {
        let k_per_level = options.k_per_level.unwrap_or(options.k);
        let mut frontier: Vec<&Node> = self.tree.roots();
        let mut collected = Vec::new();

        loop {
            let mut scored: Vec<ScoredNode> = frontier
                .iter()
                .flat_map(|node| node.children.iter())
                .filter_map(|id| self.tree.node(id))
                .map(|child| ScoredNode {
                    id: child.id.clone(),
                    level: child.level,
                    score: cosine_similarity(query, &child.embedding),
                })
                .collect();
            if scored.is_empty() {
                break;
            }

            sort_by_score(&mut scored);
            scored.truncate(k_per_level);

            frontier = scored
                .iter()
                .filter_map(|s| self.tree.node(&s.id))
                .collect();
            collected.extend(scored);
        }

        collected
    }

    /// Score the union of all levels; apply optional per-level weights.
    fn flattened(&self, query: &[f32], options: &RetrievalOptions) -> Vec<ScoredNode> {
        let weight = |level: usize| -> f32 {
            options
                .level_weights
                .as_ref()
                .and_then(|w| w.get(level))
                .copied()
                .unwrap_or(1.0)
        };

        let mut seen = std::collections::HashSet::new();
        self.tree
            .nodes_in_order()
            .filter(|node| seen.insert(node.id.clone()))
            .map(|node| ScoredNode {
                id: node.id.clone(),
                level: node.level,
                score: cosine_similarity(query, &node.embedding) * weight(node.level),
            })
            .collect()
    }

    /// Concatenate result node texts in retrieval order, each under a
    /// `[L{level} #{id}]` header.
    pub fn assemble_context(&self, results: &[ScoredNode]) -> String {
        results
            .iter()
            .filter_map(|scored| {
                self.tree
                    .node(&scored.id)
                    .map(|node| format!("[L{} #{}]\n{}", node.level, node.id, node.text))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Preview records for the response object
    pub fn previews(&self, results: &[ScoredNode]) -> Vec<RetrievedNode> {
        results
            .iter()
            .filter_map(|scored| {
                self.tree.node(&scored.id).map(|node| RetrievedNode {
                    id: scored.id.clone(),
                    level: scored.level,
                    score: scored.score,
                    text_preview: node.text.chars().take(PREVIEW_CHARS).collect(),
                })
            })
            .collect()
    }
}

/// Decreasing score, ties broken by node id for a total, reproducible order.
fn sort_by_score(results: &mut [ScoredNode]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
