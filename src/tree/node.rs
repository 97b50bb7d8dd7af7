//! Tree node types
//!
//! Nodes are created by the tree builder and never mutated afterwards. Ids
//! are deterministic: `leaf_{doc}_{chunk}` at level 0 and
//! `level_{L}_cluster_{idx}` at interior levels, so rebuilding an identical
//! corpus yields identical ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic node identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn leaf(doc_index: usize, chunk_index: usize) -> Self {
        Self(format!("leaf_{doc_index}_{chunk_index}"))
    }

    pub fn cluster(level: usize, cluster_idx: usize) -> Self {
        Self(format!("level_{level}_cluster_{cluster_idx}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A metadata dimension value: a concrete domain value, the `"unknown"`
/// sentinel (extraction found nothing), or the `"all"` sentinel (the
/// dimension has been aggregated away at this level).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetaValue {
    Unknown,
    All,
    Value(String),
}

impl MetaValue {
    pub fn value(s: impl Into<String>) -> Self {
        Self::from(s.into())
    }

    /// The literal string form used in metadata maps and group keys.
    pub fn canonical(&self) -> &str {
        match self {
            MetaValue::Unknown => "unknown",
            MetaValue::All => "all",
            MetaValue::Value(s) => s,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, MetaValue::Unknown)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, MetaValue::All)
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        match s.as_str() {
            "unknown" => MetaValue::Unknown,
            "all" => MetaValue::All,
            _ => MetaValue::Value(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<MetaValue> for String {
    fn from(v: MetaValue) -> Self {
        v.canonical().to_string()
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

// Group keys sort by canonical string, except that "all" sorts after every
// concrete value.
impl Ord for MetaValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.is_all(), other.is_all()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => self.canonical().cmp(other.canonical()),
        }
    }
}

impl PartialOrd for MetaValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Metadata carried by every node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub sector: MetaValue,
    pub company: MetaValue,
    pub year: MetaValue,
    pub num_children: usize,
    pub cluster_idx: usize,
}

static UNKNOWN_FIELD: MetaValue = MetaValue::Unknown;

impl NodeMetadata {
    pub fn leaf(sector: &str, company: &str, year: &str, position: usize) -> Self {
        Self {
            sector: MetaValue::from(sector),
            company: MetaValue::from(company),
            year: MetaValue::from(year),
            num_children: 0,
            cluster_idx: position,
        }
    }

    /// Look up a dimension by its configuration name. Unrecognised names read
    /// as unknown; the config validator rejects them long before this point.
    pub fn field(&self, name: &str) -> &MetaValue {
        match name {
            "sector" => &self.sector,
            "company" => &self.company,
            "year" => &self.year,
            _ => &UNKNOWN_FIELD,
        }
    }

    pub fn set_field(&mut self, name: &str, value: MetaValue) {
        match name {
            "sector" => self.sector = value,
            "company" => self.company = value,
            "year" => self.year = value,
            _ => {}
        }
    }

    /// `(sector, company, year)` in canonical string form
    pub fn triple(&self) -> (String, String, String) {
        (
            self.sector.canonical().to_string(),
            self.company.canonical().to_string(),
            self.year.canonical().to_string(),
        )
    }
}

/// The sole tree entity: an original chunk at level 0, an abstractive summary
/// above.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub text: String,
    pub embedding: Vec<f32>,
    pub level: usize,
    /// Child ids in cluster-member order (empty at level 0)
    pub children: Vec<NodeId>,
    /// Set for every node except the root
    pub parent: Option<NodeId>,
    pub metadata: NodeMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_deterministic() {
        assert_eq!(NodeId::leaf(2, 7).as_str(), "leaf_2_7");
        assert_eq!(NodeId::cluster(3, 0).as_str(), "level_3_cluster_0");
    }

    #[test]
    fn sentinels_round_trip_through_strings() {
        assert_eq!(MetaValue::from("unknown"), MetaValue::Unknown);
        assert_eq!(MetaValue::from("all"), MetaValue::All);
        assert_eq!(
            MetaValue::from("Acme Corp"),
            MetaValue::Value("Acme Corp".to_string())
        );
        assert_eq!(String::from(MetaValue::All), "all");
    }

    #[test]
    fn all_sorts_after_concrete_values() {
        let mut values = vec![
            MetaValue::All,
            MetaValue::value("zeta"),
            MetaValue::Unknown,
            MetaValue::value("alpha"),
        ];
        values.sort();
        assert_eq!(values[0], MetaValue::value("alpha"));
        assert_eq!(values[1], MetaValue::Unknown); // "unknown" sorts as a string
        assert_eq!(values[2], MetaValue::value("zeta"));
        assert_eq!(values[3], MetaValue::All);
    }

    #[test]
    fn metadata_fields_are_addressable_by_name() {
        let mut meta = NodeMetadata::leaf("technology", "Acme Corp", "2023", 0);
        assert_eq!(meta.field("company").canonical(), "Acme Corp");
        meta.set_field("year", MetaValue::All);
        assert!(meta.year.is_all());
    }
}
