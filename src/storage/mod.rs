//! Tree persistence
//!
//! A saved tree is a directory of three files: `nodes.bin` (compact bincode
//! records), `nodes.json` (the same records as JSON, the durable contract),
//! and `index.json` (the manifest, source of truth for the embedding
//! dimension and level counts). Loading tries the binary form first and falls
//! back to JSON. Loading never calls a provider.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{FintreeError, Result};
use crate::tree::{Node, NodeId, NodeMetadata, Tree};

const BINARY_FILE: &str = "nodes.bin";
const JSON_FILE: &str = "nodes.json";
const MANIFEST_FILE: &str = "index.json";

/// One persisted node, in level-then-cluster order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub level: usize,
    pub text: String,
    pub embedding: Vec<f32>,
    pub parent_id: Option<NodeId>,
    pub metadata: NodeMetadata,
}

/// The build-time configuration recorded alongside the tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_depth: usize,
    pub reduction_dimension: usize,
    pub max_clusters: usize,
    pub min_cluster_size: usize,
    pub max_cluster_size: usize,
    pub summarization_length: usize,
}

impl SnapshotConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            max_depth: config.tree.max_depth,
            reduction_dimension: config.tree.reduction_dimension,
            max_clusters: config.tree.max_clusters,
            min_cluster_size: config.tree.min_cluster_size,
            max_cluster_size: config.tree.max_cluster_size,
            summarization_length: config.tree.summarization_length,
        }
    }
}

/// `index.json`: the snapshot manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub dimension: usize,
    pub total_nodes: usize,
    pub levels: Vec<usize>,
    pub config: SnapshotConfig,
}

/// Reads and writes tree snapshots under one directory
pub struct TreeStore {
    dir: PathBuf,
}

impl TreeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save(&self, tree: &Tree, config: &Config) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| FintreeError::Io {
            source: e,
            context: format!("Failed to create snapshot directory: {}", self.dir.display()),
        })?;

        let records: Vec<NodeRecord> = tree
            .nodes_in_order()
            .map(|node| NodeRecord {
                id: node.id.clone(),
                level: node.level,
                text: node.text.clone(),
                embedding: node.embedding.clone(),
                parent_id: node.parent.clone(),
                metadata: node.metadata.clone(),
            })
            .collect();

        let stats = tree.statistics();
        let manifest = IndexManifest {
            dimension: tree.dimension(),
            total_nodes: stats.total_nodes,
            levels: stats.nodes_per_level,
            config: SnapshotConfig::from_config(config),
        };

        let binary = bincode::serialize(&records)?;
        write_atomic(&self.dir.join(BINARY_FILE), &binary)?;

        let json = serde_json::to_vec_pretty(&records).map_err(|e| FintreeError::Json {
            source: e,
            context: "Failed to serialize node records".to_string(),
        })?;
        write_atomic(&self.dir.join(JSON_FILE), &json)?;

        let manifest_json =
            serde_json::to_vec_pretty(&manifest).map_err(|e| FintreeError::Json {
                source: e,
                context: "Failed to serialize index manifest".to_string(),
            })?;
        write_atomic(&self.dir.join(MANIFEST_FILE), &manifest_json)?;

        info!(
            nodes = manifest.total_nodes,
            dir = %self.dir.display(),
            "tree snapshot written"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<(Tree, IndexManifest)> {
        let manifest_path = self.dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(FintreeError::IndexNotFound {
                path: self.dir.clone(),
            });
        }

        let manifest_bytes = fs::read(&manifest_path).map_err(|e| FintreeError::Io {
            source: e,
            context: format!("Failed to read manifest: {}", manifest_path.display()),
        })?;
        let manifest: IndexManifest =
            serde_json::from_slice(&manifest_bytes).map_err(|e| FintreeError::Json {
                source: e,
                context: format!("Failed to parse manifest: {}", manifest_path.display()),
            })?;

        let records = self.load_records()?;

        if records.len() != manifest.total_nodes {
            return Err(FintreeError::SnapshotCorrupt(format!(
                "manifest lists {} nodes but snapshot holds {}",
                manifest.total_nodes,
                records.len()
            )));
        }

        let mut tree = Tree::new(manifest.dimension);
        for record in &records {
            tree.insert(Node {
                id: record.id.clone(),
                text: record.text.clone(),
                embedding: record.embedding.clone(),
                level: record.level,
                children: Vec::new(),
                parent: None,
                metadata: record.metadata.clone(),
            });
        }
        // Records are level-ascending, so children exist before their parent;
        // linking in record order restores each parent's child order.
        for record in &records {
            if let Some(parent_id) = &record.parent_id {
                tree.link(parent_id, &record.id);
            }
        }

        let stats = tree.statistics();
        if stats.nodes_per_level != manifest.levels {
            return Err(FintreeError::SnapshotCorrupt(format!(
                "manifest levels {:?} disagree with snapshot levels {:?}",
                manifest.levels, stats.nodes_per_level
            )));
        }

        Ok((tree, manifest))
    }

    /// Binary form first, JSON fallback.
    fn load_records(&self) -> Result<Vec<NodeRecord>> {
        let binary_path = self.dir.join(BINARY_FILE);
        if binary_path.exists() {
            match fs::read(&binary_path) {
                Ok(bytes) => match bincode::deserialize(&bytes) {
                    Ok(records) => return Ok(records),
                    Err(e) => {
                        warn!(error = %e, "binary snapshot unreadable, falling back to JSON")
                    }
                },
                Err(e) => warn!(error = %e, "binary snapshot unreadable, falling back to JSON"),
            }
        }

        let json_path = self.dir.join(JSON_FILE);
        let bytes = fs::read(&json_path).map_err(|e| FintreeError::Io {
            source: e,
            context: format!("Failed to read snapshot: {}", json_path.display()),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| FintreeError::Json {
            source: e,
            context: format!("Failed to parse snapshot: {}", json_path.display()),
        })
    }
}

/// Write via a temp file and rename, so readers never observe a torn file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| FintreeError::Io {
        source: e,
        context: format!("Failed to write {}", tmp.display()),
    })?;
    fs::rename(&tmp, path).map_err(|e| FintreeError::Io {
        source: e,
        context: format!("Failed to move {} into place", path.display()),
    })
}
