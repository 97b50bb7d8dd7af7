//! Retrieval behaviour over a built tree: strategy characteristics, caps,
//! and failure semantics.

mod common;

use std::sync::Arc;

use fintree::{
    Config, DocumentInput, Embedder, Engine, FintreeError, ProviderError, ProviderSet, QaModel,
    RetrievalMethod, RetrievalOptions,
};

use common::{scenario_docs, scenario_providers, MockQa, ScenarioEmbedder, SumSummarizer};

fn built_engine() -> Engine {
    let engine = Engine::new(Config::default(), scenario_providers()).unwrap();
    let documents: Vec<DocumentInput> = scenario_docs()
        .into_iter()
        .map(DocumentInput::new)
        .collect();
    engine.add_documents(&documents).unwrap();
    engine
}

// Scenario D: a broad query through hierarchical traversal surfaces summary
// nodes, not just leaves.
#[test]
fn hierarchical_retrieval_surfaces_summaries_for_broad_queries() {
    let engine = built_engine();
    let response = engine
        .query_with(
            "Give me an overview of both companies",
            RetrievalOptions::new(3, RetrievalMethod::Hierarchical),
        )
        .unwrap();

    assert_eq!(response.retrieved_nodes.len(), 3);
    assert!(
        response.retrieved_nodes.iter().any(|n| n.level >= 2),
        "no summary above level 1 in {:?}",
        response.retrieved_nodes
    );
}

// Scenario E: a precise factual query through flattened search ranks the
// matching leaf first.
#[test]
fn flattened_retrieval_ranks_the_matching_leaf_first() {
    let engine = built_engine();
    let response = engine
        .query_with(
            "What was Apple's revenue?",
            RetrievalOptions::new(3, RetrievalMethod::Flattened),
        )
        .unwrap();

    let top = &response.retrieved_nodes[0];
    assert_eq!(top.id.as_str(), "leaf_0_0");
    assert_eq!(top.level, 0);
    for other in &response.retrieved_nodes[1..] {
        assert!(top.score >= other.score);
    }
}

#[test]
fn retrieval_is_idempotent_on_an_unchanged_tree() {
    let engine = built_engine();
    let run = || {
        engine
            .query_with(
                "What was Apple's revenue?",
                RetrievalOptions::new(5, RetrievalMethod::Flattened),
            )
            .unwrap()
            .retrieved_nodes
            .iter()
            .map(|n| (n.id.clone(), n.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn output_never_exceeds_k_and_has_no_duplicates() {
    let engine = built_engine();
    for method in [RetrievalMethod::Hierarchical, RetrievalMethod::Flattened] {
        for k in [1, 2, 3, 50] {
            let response = engine
                .query_with("overview of everything", RetrievalOptions::new(k, method))
                .unwrap();
            assert!(response.retrieved_nodes.len() <= k);

            let mut ids: Vec<_> = response
                .retrieved_nodes
                .iter()
                .map(|n| n.id.clone())
                .collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), response.retrieved_nodes.len());
        }
    }
}

#[test]
fn context_lists_nodes_in_retrieval_order_with_headers() {
    let engine = built_engine();
    let response = engine
        .query_with(
            "What was Apple's revenue?",
            RetrievalOptions::new(2, RetrievalMethod::Flattened),
        )
        .unwrap();

    let first_header = format!(
        "[L{} #{}]",
        response.retrieved_nodes[0].level, response.retrieved_nodes[0].id
    );
    assert!(response.context.starts_with(&first_header));
    assert_eq!(response.question, "What was Apple's revenue?");
    assert_eq!(response.retrieval_method, RetrievalMethod::Flattened);
}

#[test]
fn previews_are_capped_at_two_hundred_chars() {
    let engine = built_engine();
    let response = engine
        .query_with(
            "overview of everything",
            RetrievalOptions::new(9, RetrievalMethod::Flattened),
        )
        .unwrap();
    for node in &response.retrieved_nodes {
        assert!(node.text_preview.chars().count() <= 200);
    }
}

struct FailingQa;

impl QaModel for FailingQa {
    fn answer(&self, _context: &str, _question: &str) -> Result<String, ProviderError> {
        Err(ProviderError::MalformedResponse("no usable answer".into()))
    }
}

// QA failure returns the retrieved nodes with a marker in place of the answer.
#[test]
fn qa_failure_keeps_retrieved_nodes() {
    let providers = ProviderSet::new(
        Arc::new(ScenarioEmbedder),
        Arc::new(SumSummarizer),
        Arc::new(FailingQa),
    );
    let engine = Engine::new(Config::default(), providers).unwrap();
    let documents: Vec<DocumentInput> = scenario_docs()
        .into_iter()
        .map(DocumentInput::new)
        .collect();
    engine.add_documents(&documents).unwrap();

    let response = engine.query("What was Apple's revenue?").unwrap();
    assert!(response.answer.starts_with("[answer unavailable:"));
    assert!(!response.retrieved_nodes.is_empty());
}

/// Embeds corpus texts but refuses questions, to exercise the query path.
struct QuestionAverseEmbedder;

impl Embedder for QuestionAverseEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.contains('?') {
            return Err(ProviderError::Auth("no questions".into()));
        }
        ScenarioEmbedder.embed(text)
    }

    fn dimension(&self) -> usize {
        4
    }

    fn model_name(&self) -> &str {
        "question-averse"
    }
}

#[test]
fn query_embedding_failure_propagates_without_partial_results() {
    let providers = ProviderSet::new(
        Arc::new(QuestionAverseEmbedder),
        Arc::new(SumSummarizer),
        Arc::new(MockQa),
    );
    let engine = Engine::new(Config::default(), providers).unwrap();
    let documents: Vec<DocumentInput> = scenario_docs()
        .into_iter()
        .map(DocumentInput::new)
        .collect();
    engine.add_documents(&documents).unwrap();

    match engine.query("What was Apple's revenue?") {
        Err(FintreeError::QueryEmbedding(_)) => {}
        other => panic!("expected QueryEmbedding error, got {other:?}"),
    }
}
