//! Fixed-hierarchy clustering
//!
//! The primary grouping at every interior level is deterministic, by metadata:
//! level 1 groups siblings on `(sector, company, year)`, level 2 on
//! `(sector, company)`, level 3 on `(sector)`, and level 4 pools everything.
//! Only groups larger than `max_cluster_size` fall back to embedding
//! sub-clustering (reduction + GMM with BIC selection).

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::config::TreeConfig;
use crate::tree::{MetaValue, Node};

mod gmm;
mod reduction;

/// One cluster: input-node indices in ascending order. Each cluster becomes a
/// single parent node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub members: Vec<usize>,
}

/// Groups sibling nodes for one target level
#[derive(Debug, Clone)]
pub struct Clusterer {
    max_cluster_size: usize,
    min_cluster_size: usize,
    reduction_dimension: usize,
    max_clusters: usize,
    seed: u64,
    metadata_keys: Vec<String>,
}

impl Clusterer {
    pub fn new(config: &TreeConfig) -> Self {
        Self {
            max_cluster_size: config.max_cluster_size,
            min_cluster_size: config.min_cluster_size,
            reduction_dimension: config.reduction_dimension,
            max_clusters: config.max_clusters,
            seed: config.gaussian_random_state,
            metadata_keys: config.metadata_keys.clone(),
        }
    }

    /// Partition `nodes` into the clusters for target level `level` (1..=4).
    /// Cluster order: metadata groups by canonical key order (`"all"` after
    /// concrete values), sub-clusters within a group by decreasing size with
    /// ties broken by smallest member index.
    pub fn cluster(&self, nodes: &[&Node], level: usize) -> Vec<Cluster> {
        if nodes.is_empty() {
            return Vec::new();
        }
        if nodes.len() == 1 {
            return vec![Cluster { members: vec![0] }];
        }

        let keys_used = self.metadata_keys.len().saturating_sub(level - 1);

        let mut groups: BTreeMap<Vec<MetaValue>, Vec<usize>> = BTreeMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            let key: Vec<MetaValue> = self.metadata_keys[..keys_used]
                .iter()
                .map(|field| node.metadata.field(field).clone())
                .collect();
            groups.entry(key).or_default().push(idx);
        }

        let mut clusters = Vec::new();
        for (_, members) in groups {
            if members.len() <= self.max_cluster_size {
                clusters.push(Cluster { members });
            } else {
                clusters.extend(self.subcluster(&members, nodes));
            }
        }
        clusters
    }

    /// Split one oversized metadata group by embedding similarity.
    fn subcluster(&self, members: &[usize], nodes: &[&Node]) -> Vec<Cluster> {
        let n = members.len();
        let d = nodes[members[0]].embedding.len();
        let mut flat = Vec::with_capacity(n * d);
        for &idx in members {
            flat.extend(nodes[idx].embedding.iter().map(|&x| x as f64));
        }
        let data = Array2::from_shape_vec((n, d), flat).expect("embedding matrix shape");

        let reduced = reduction::reduce(&data, self.reduction_dimension, self.seed);
        let fit = gmm::select_components(&reduced, self.max_clusters, self.seed);

        // Gather positions per component, ascending within each.
        let mut partitions: Vec<Vec<usize>> = vec![Vec::new(); fit.n_components];
        for (pos, &label) in fit.labels.iter().enumerate() {
            partitions[label].push(pos);
        }
        partitions.retain(|p| !p.is_empty());

        let partitions = self.absorb_small(partitions, &reduced);

        let mut clusters: Vec<Cluster> = partitions
            .into_iter()
            .map(|positions| Cluster {
                members: positions.into_iter().map(|p| members[p]).collect(),
            })
            .collect();

        clusters.sort_by(|a, b| {
            b.members
                .len()
                .cmp(&a.members.len())
                .then_with(|| a.members.iter().min().cmp(&b.members.iter().min()))
        });
        clusters
    }

    /// Merge partitions below `min_cluster_size` into the nearest surviving
    /// partition by centroid cosine distance.
    fn absorb_small(&self, partitions: Vec<Vec<usize>>, reduced: &Array2<f64>) -> Vec<Vec<usize>> {
        let (mut survivors, small): (Vec<Vec<usize>>, Vec<Vec<usize>>) = partitions
            .into_iter()
            .partition(|p| p.len() >= self.min_cluster_size);

        if survivors.is_empty() {
            // Nothing survives on its own; fold the whole group back together.
            let mut all: Vec<usize> = small.into_iter().flatten().collect();
            all.sort_unstable();
            return vec![all];
        }

        let centroid = |positions: &[usize]| -> Vec<f64> {
            let d = reduced.ncols();
            let mut c = vec![0.0; d];
            for &p in positions {
                for j in 0..d {
                    c[j] += reduced[[p, j]];
                }
            }
            for x in &mut c {
                *x /= positions.len() as f64;
            }
            c
        };

        let survivor_centroids: Vec<Vec<f64>> = survivors.iter().map(|p| centroid(p)).collect();

        for positions in small {
            let c = centroid(&positions);
            let nearest = survivor_centroids
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    cosine_distance(&c, a)
                        .partial_cmp(&cosine_distance(&c, b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
                .unwrap_or(0);
            survivors[nearest].extend(positions);
        }

        for positions in &mut survivors {
            positions.sort_unstable();
        }
        survivors
    }
}

fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeId, NodeMetadata};

    fn leaf(idx: usize, sector: &str, company: &str, year: &str, embedding: Vec<f32>) -> Node {
        Node {
            id: NodeId::leaf(0, idx),
            text: format!("chunk {idx}"),
            embedding,
            level: 0,
            children: Vec::new(),
            parent: None,
            metadata: NodeMetadata::leaf(sector, company, year, idx),
        }
    }

    fn config() -> TreeConfig {
        TreeConfig {
            max_cluster_size: 10,
            min_cluster_size: 2,
            reduction_dimension: 2,
            max_clusters: 5,
            ..TreeConfig::default()
        }
    }

    #[test]
    fn empty_input_gives_no_clusters() {
        let clusterer = Clusterer::new(&config());
        assert!(clusterer.cluster(&[], 1).is_empty());
    }

    #[test]
    fn single_node_is_a_singleton_cluster() {
        let clusterer = Clusterer::new(&config());
        let node = leaf(0, "technology", "Acme Corp", "2023", vec![1.0, 0.0]);
        let clusters = clusterer.cluster(&[&node], 1);
        assert_eq!(clusters, vec![Cluster { members: vec![0] }]);
    }

    #[test]
    fn level_one_groups_on_the_full_triple() {
        let clusterer = Clusterer::new(&config());
        let nodes = vec![
            leaf(0, "technology", "Acme Corp", "2023", vec![1.0, 0.0]),
            leaf(1, "technology", "Acme Corp", "2022", vec![1.0, 0.0]),
            leaf(2, "technology", "Acme Corp", "2023", vec![0.0, 1.0]),
            leaf(3, "finance", "BankCo Inc", "2023", vec![0.0, 1.0]),
        ];
        let refs: Vec<&Node> = nodes.iter().collect();
        let clusters = clusterer.cluster(&refs, 1);

        // groups: (finance,...), (tech,...,2022), (tech,...,2023)
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].members, vec![3]);
        assert_eq!(clusters[1].members, vec![1]);
        assert_eq!(clusters[2].members, vec![0, 2]);
    }

    #[test]
    fn level_three_groups_on_sector_only() {
        let clusterer = Clusterer::new(&config());
        let nodes = vec![
            leaf(0, "technology", "Acme Corp", "2023", vec![1.0, 0.0]),
            leaf(1, "technology", "Globex Inc", "2021", vec![1.0, 0.0]),
            leaf(2, "finance", "BankCo Inc", "2023", vec![0.0, 1.0]),
        ];
        let refs: Vec<&Node> = nodes.iter().collect();
        let clusters = clusterer.cluster(&refs, 3);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![2]);
        assert_eq!(clusters[1].members, vec![0, 1]);
    }

    #[test]
    fn level_four_pools_everything() {
        let clusterer = Clusterer::new(&config());
        let nodes = vec![
            leaf(0, "technology", "Acme Corp", "2023", vec![1.0, 0.0]),
            leaf(1, "finance", "BankCo Inc", "2021", vec![0.0, 1.0]),
            leaf(2, "unknown", "unknown", "unknown", vec![0.5, 0.5]),
        ];
        let refs: Vec<&Node> = nodes.iter().collect();
        let clusters = clusterer.cluster(&refs, 4);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![0, 1, 2]);
    }

    #[test]
    fn oversized_group_is_subclustered() {
        let clusterer = Clusterer::new(&config());
        // 24 nodes, one metadata group, two well-separated embedding blobs
        let nodes: Vec<Node> = (0..24)
            .map(|i| {
                let base = if i < 12 { [0.0, 1.0] } else { [1.0, 0.0] };
                let jitter = (i % 6) as f32 * 0.01;
                leaf(
                    i,
                    "finance",
                    "BankCo Inc",
                    "2024",
                    vec![base[0] + jitter, base[1] - jitter],
                )
            })
            .collect();
        let refs: Vec<&Node> = nodes.iter().collect();
        let clusters = clusterer.cluster(&refs, 1);

        assert!(clusters.len() >= 2);
        assert!(clusters.len() <= 5);
        let total: usize = clusters.iter().map(|c| c.members.len()).sum();
        assert_eq!(total, 24);
        for cluster in &clusters {
            let sorted = {
                let mut m = cluster.members.clone();
                m.sort_unstable();
                m
            };
            assert_eq!(cluster.members, sorted);
        }
    }
}
