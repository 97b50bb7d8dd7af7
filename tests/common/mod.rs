//! Shared test doubles: deterministic providers with hand-picked geometry so
//! retrieval expectations are exact.
#![allow(dead_code)]

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use fintree::{Embedder, ProviderError, ProviderSet, QaModel, Summarizer};

/// Unit 4-vectors keyed on content flags: axis 0 = Apple material, axis 1 =
/// JPMorgan material, axis 2 = summary nodes, axis 3 = anything else. Broad
/// "overview" queries point at material plus summaries.
pub struct ScenarioEmbedder;

impl Embedder for ScenarioEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty text".into()));
        }
        let mut v = [0.0f32; 4];
        if text.contains("overview") {
            v = [1.0, 1.0, 1.0, 0.0];
        } else {
            if text.contains("Apple") {
                v[0] = 1.0;
            }
            if text.contains("JPMorgan") {
                v[1] = 1.0;
            }
            if text.starts_with("SUM(") {
                v[2] = 1.0;
            }
            if v == [0.0; 4] {
                v[3] = 1.0;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        Ok(v.iter().map(|x| x / norm).collect())
    }

    fn dimension(&self) -> usize {
        4
    }

    fn model_name(&self) -> &str {
        "scenario-4d"
    }
}

/// The mocked summarizer from the scenarios: `SUM(` + joined texts + `)`.
pub struct SumSummarizer;

impl Summarizer for SumSummarizer {
    fn summarize(&self, texts: &[String], _max_tokens: usize) -> Result<String, ProviderError> {
        Ok(format!("SUM({})", texts.join("\n\n")))
    }
}

/// QA double that just acknowledges its inputs deterministically.
pub struct MockQa;

impl QaModel for MockQa {
    fn answer(&self, context: &str, question: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "answered '{question}' from {} context chars",
            context.len()
        ))
    }
}

pub fn scenario_providers() -> ProviderSet {
    ProviderSet::new(
        Arc::new(ScenarioEmbedder),
        Arc::new(SumSummarizer),
        Arc::new(MockQa),
    )
}

/// The two Scenario A documents.
pub fn scenario_docs() -> Vec<&'static str> {
    vec![
        "Apple Inc. 2023 Annual Report - Technology Sector. Revenue was 383.3 billion.",
        "JPMorgan Chase & Co. 2023 Annual Report - Finance Sector. Revenue was 158.1 billion.",
    ]
}

/// 16-dimensional embeddings drawn from three well-separated Gaussians, keyed
/// by the `segment N` marker in leaf texts. Summary texts get a fixed vector.
pub struct GaussianEmbedder {
    vectors: Vec<Vec<f32>>,
}

impl GaussianEmbedder {
    pub const DIMENSION: usize = 16;

    pub fn new(count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0f32, 0.2).unwrap();
        let vectors = (0..count)
            .map(|i| {
                let blob = i % 3;
                let mut v: Vec<f32> = (0..Self::DIMENSION)
                    .map(|_| noise.sample(&mut rng))
                    .collect();
                v[blob * 3] += 12.0;
                v
            })
            .collect();
        Self { vectors }
    }

    fn segment_index(text: &str) -> Option<usize> {
        let rest = &text[text.find("segment ")? + "segment ".len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

impl Embedder for GaussianEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.starts_with("SUM(") {
            let mut v = vec![0.0; Self::DIMENSION];
            v[Self::DIMENSION - 1] = 1.0;
            return Ok(v);
        }
        Self::segment_index(text)
            .and_then(|i| self.vectors.get(i).cloned())
            .ok_or_else(|| ProviderError::MalformedResponse(format!("no vector for: {text}")))
    }

    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    fn model_name(&self) -> &str {
        "gaussian-16d"
    }
}
