//! Tree construction: scenario builds and the structural invariants every
//! built tree must satisfy.

mod common;

use std::sync::Arc;

use fintree::chunking::Chunk;
use fintree::chunking::DocumentFacts;
use fintree::tree::TreeBuilder;
use fintree::{Config, DocumentInput, Engine, MetaValue, ProviderSet, Tree};

use common::{scenario_docs, scenario_providers, GaussianEmbedder, MockQa, SumSummarizer};

fn scenario_engine() -> Engine {
    Engine::new(Config::default(), scenario_providers()).unwrap()
}

fn build_scenario_tree(engine: &Engine) {
    let documents: Vec<DocumentInput> = scenario_docs()
        .into_iter()
        .map(DocumentInput::new)
        .collect();
    engine.add_documents(&documents).unwrap();
}

fn triple_at(tree: &Tree, level: usize) -> Vec<(String, String, String)> {
    tree.level(level)
        .iter()
        .map(|id| tree.node(id).unwrap().metadata.triple())
        .collect()
}

// Scenario A: two documents, five levels, metadata squashed one dimension at
// a time on the way up.
#[test]
fn two_document_build_produces_the_fixed_hierarchy() {
    let engine = scenario_engine();
    build_scenario_tree(&engine);
    let tree = engine.tree().unwrap();

    let stats = tree.statistics();
    assert_eq!(stats.nodes_per_level, vec![2, 2, 2, 2, 1]);

    let mut leaves = triple_at(&tree, 0);
    leaves.sort();
    assert_eq!(
        leaves,
        vec![
            (
                "finance".to_string(),
                "JPMorgan Chase & Co.".to_string(),
                "2023".to_string()
            ),
            (
                "technology".to_string(),
                "Apple Inc.".to_string(),
                "2023".to_string()
            ),
        ]
    );

    for triple in triple_at(&tree, 1) {
        assert_ne!(triple.0, "all");
        assert_ne!(triple.1, "all");
        assert_ne!(triple.2, "all");
    }
    for triple in triple_at(&tree, 2) {
        assert_ne!(triple.0, "all");
        assert_ne!(triple.1, "all");
        assert_eq!(triple.2, "all");
    }
    for triple in triple_at(&tree, 3) {
        assert_ne!(triple.0, "all");
        assert_eq!(triple.1, "all");
        assert_eq!(triple.2, "all");
    }
    assert_eq!(
        triple_at(&tree, 4),
        vec![("all".to_string(), "all".to_string(), "all".to_string())]
    );
}

#[test]
fn parent_child_levels_differ_by_one_and_counts_match() {
    let engine = scenario_engine();
    build_scenario_tree(&engine);
    let tree = engine.tree().unwrap();

    for node in tree.nodes_in_order() {
        assert_eq!(node.metadata.num_children, node.children.len());
        if let Some(parent_id) = &node.parent {
            let parent = tree.node(parent_id).unwrap();
            assert_eq!(parent.level, node.level + 1);
            assert!(parent.children.contains(&node.id));
        } else {
            assert_eq!(node.level, tree.depth(), "only the root lacks a parent");
        }
    }
}

#[test]
fn root_is_reachable_from_every_leaf() {
    let engine = scenario_engine();
    build_scenario_tree(&engine);
    let tree = engine.tree().unwrap();
    let root_id = tree.root().unwrap().id.clone();

    for leaf_id in tree.level(0) {
        let mut current = tree.node(leaf_id).unwrap();
        let mut hops = 0;
        while let Some(parent_id) = &current.parent {
            current = tree.node(parent_id).unwrap();
            hops += 1;
            assert!(hops <= 4, "parent chain too long");
        }
        assert_eq!(current.id, root_id);
    }
}

#[test]
fn leaf_order_follows_document_then_chunk_order() {
    let engine = scenario_engine();
    build_scenario_tree(&engine);
    let tree = engine.tree().unwrap();

    let leaf_ids: Vec<String> = tree
        .level(0)
        .iter()
        .map(|id| id.as_str().to_string())
        .collect();
    assert_eq!(leaf_ids, vec!["leaf_0_0", "leaf_1_0"]);
}

// Interior node embeddings come from embedding the summary text, not from
// averaging children.
#[test]
fn interior_embeddings_are_summary_embeddings() {
    let engine = scenario_engine();
    build_scenario_tree(&engine);
    let tree = engine.tree().unwrap();

    for level in 1..=tree.depth() {
        for id in tree.level(level) {
            let node = tree.node(id).unwrap();
            assert!(node.text.starts_with("SUM("));
            // the scenario embedder marks summary texts on axis 2
            assert!(node.embedding[2] > 0.0);
        }
    }
}

// Determinism under fixed providers: byte-identical ids, children, metadata,
// and embeddings across rebuilds.
#[test]
fn rebuilding_identical_input_is_identical() {
    let engine_a = scenario_engine();
    let engine_b = scenario_engine();
    build_scenario_tree(&engine_a);
    build_scenario_tree(&engine_b);
    let tree_a = engine_a.tree().unwrap();
    let tree_b = engine_b.tree().unwrap();

    assert_eq!(tree_a.len(), tree_b.len());
    for level in 0..=tree_a.depth() {
        assert_eq!(tree_a.level(level), tree_b.level(level));
    }
    for node_a in tree_a.nodes_in_order() {
        let node_b = tree_b.node(&node_a.id).unwrap();
        assert_eq!(node_a.text, node_b.text);
        assert_eq!(node_a.children, node_b.children);
        assert_eq!(node_a.parent, node_b.parent);
        assert_eq!(node_a.metadata, node_b.metadata);
        assert_eq!(node_a.embedding, node_b.embedding);
    }
}

// Scenario C: one oversized metadata group falls back to embedding
// sub-clustering; the metadata triple survives on every parent.
#[test]
fn oversized_group_subclusters_and_keeps_its_triple() {
    const DOCS: usize = 250;

    let providers = ProviderSet::new(
        Arc::new(GaussianEmbedder::new(DOCS)),
        Arc::new(SumSummarizer),
        Arc::new(MockQa),
    );
    let engine = Engine::new(Config::default(), providers).unwrap();

    let documents: Vec<DocumentInput> = (0..DOCS)
        .map(|i| {
            DocumentInput::new(format!(
                "BankCo Inc 2024 financial report segment {i}. Lending margins held."
            ))
        })
        .collect();
    engine.add_documents(&documents).unwrap();
    let tree = engine.tree().unwrap();

    assert_eq!(tree.level(0).len(), DOCS);

    let level_one = tree.level(1);
    assert!(level_one.len() >= 2, "expected sub-clustering to split");
    assert!(level_one.len() <= 5, "BIC cap exceeded");

    let mut total_children = 0;
    for id in level_one {
        let node = tree.node(id).unwrap();
        total_children += node.children.len();
        assert_eq!(node.metadata.sector, MetaValue::value("finance"));
        assert_eq!(node.metadata.company, MetaValue::value("BankCo Inc"));
        assert_eq!(node.metadata.year, MetaValue::value("2024"));
    }
    assert_eq!(total_children, DOCS);
}

// Empty chunks are skipped with a warning, not an error.
#[test]
fn empty_chunks_are_skipped_with_a_warning() {
    let config = Config::default();
    let providers = ProviderSet::offline();
    let builder = TreeBuilder::new(&config, &providers).unwrap();

    let facts = DocumentFacts::default();
    let chunks = vec![
        Chunk {
            text: "Acme Corp 2023 technology report.".to_string(),
            doc_index: 0,
            chunk_index: 0,
            facts: facts.clone(),
        },
        Chunk {
            text: "   ".to_string(),
            doc_index: 0,
            chunk_index: 1,
            facts,
        },
    ];

    let tree = builder.build(&chunks).unwrap();
    assert_eq!(tree.level(0).len(), 1);
    assert_eq!(tree.warnings().len(), 1);
    assert!(tree.warnings()[0].contains("empty chunk"));
}

// A single-document corpus converges to a single-node level early and stops
// there instead of stacking four redundant levels.
#[test]
fn single_document_stops_at_the_first_single_node_level() {
    let engine = scenario_engine();
    engine
        .add_documents(&[DocumentInput::new(scenario_docs()[0])])
        .unwrap();
    let tree = engine.tree().unwrap();

    assert_eq!(tree.depth(), 1);
    assert_eq!(tree.level(1).len(), 1);
    assert!(tree.root().is_some());
}
