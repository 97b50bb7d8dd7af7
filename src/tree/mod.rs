//! The summary tree and its builder

use serde::Serialize;
use std::collections::HashMap;

mod builder;
mod node;

pub use builder::{inherit_metadata, CancelToken, TreeBuilder};
pub use node::{MetaValue, Node, NodeId, NodeMetadata};

/// A built summary tree: an id-keyed node map plus a per-level index in build
/// order. Read-only once the builder returns it.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    levels: Vec<Vec<NodeId>>,
    dimension: usize,
    warnings: Vec<String>,
}

/// Shape summary returned by `statistics`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeStatistics {
    pub total_nodes: usize,
    pub tree_depth: usize,
    pub nodes_per_level: Vec<usize>,
}

impl Tree {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            levels: Vec::new(),
            dimension,
            warnings: Vec::new(),
        }
    }

    /// Insert a node; its position within its level is the insertion order.
    pub(crate) fn insert(&mut self, node: Node) {
        while self.levels.len() <= node.level {
            self.levels.push(Vec::new());
        }
        self.levels[node.level].push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    /// Record a parent-child edge on both endpoints. The child must already
    /// be present.
    pub(crate) fn link(&mut self, parent_id: &NodeId, child_id: &NodeId) {
        if let Some(child) = self.nodes.get_mut(child_id) {
            child.parent = Some(parent_id.clone());
        }
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            if !parent.children.contains(child_id) {
                parent.children.push(child_id.clone());
            }
        }
    }

    pub(crate) fn push_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Node ids at a level, in build order. Out-of-range levels are empty.
    pub fn level(&self, level: usize) -> &[NodeId] {
        self.levels.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Index of the top non-empty level (0 for an empty tree).
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// The top-level nodes; exactly one for a fully built tree.
    pub fn roots(&self) -> Vec<&Node> {
        self.level(self.depth())
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    pub fn root(&self) -> Option<&Node> {
        let top = self.level(self.depth());
        match top {
            [only] => self.nodes.get(only),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Build warnings (skipped empty chunks and the like)
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// All nodes in level-then-build order
    pub fn nodes_in_order(&self) -> impl Iterator<Item = &Node> {
        self.levels
            .iter()
            .flatten()
            .filter_map(move |id| self.nodes.get(id))
    }

    pub fn statistics(&self) -> TreeStatistics {
        TreeStatistics {
            total_nodes: self.nodes.len(),
            tree_depth: self.depth(),
            nodes_per_level: self.levels.iter().map(Vec::len).collect(),
        }
    }
}
