//! Deterministic offline providers
//!
//! These stand in when no hosted model is configured: embeddings are hashed
//! bag-of-words vectors, summaries and answers are extractive. Quality is
//! modest but every output is a pure function of its input, which is what the
//! build pipeline and the test suite require.

use super::{Embedder, ProviderError, QaModel, Summarizer};
use crate::text::{split_sentences, tokenize};

/// Hashed bag-of-words embedder
///
/// Each lowercased alphanumeric token is hashed (FNV-1a) into one of
/// `dimension` buckets; the bucket counts are L2-normalised. Cosine similarity
/// between two such vectors approximates token overlap.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSION: usize = 256;

    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let bucket = (fnv1a(&token) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

/// Take leading sentences from `texts` until the whitespace-token budget is
/// spent. At least one sentence is always returned when any text is present.
///
/// This is also the fallback summary the tree builder uses when a hosted
/// summarizer exhausts its retries or returns an empty string.
pub(crate) fn extractive_summary(texts: &[String], max_tokens: usize) -> String {
    let combined = texts.join("\n\n");
    let mut summary = String::new();
    let mut spent = 0usize;

    for sentence in split_sentences(&combined) {
        let cost = sentence.split_whitespace().count();
        if spent + cost > max_tokens && !summary.is_empty() {
            break;
        }
        if !summary.is_empty() {
            summary.push(' ');
        }
        summary.push_str(sentence.trim());
        spent += cost;
        if spent >= max_tokens {
            break;
        }
    }
    summary
}

/// Extractive summarizer: leading sentences within the token budget.
pub struct ExtractiveSummarizer;

impl Summarizer for ExtractiveSummarizer {
    fn summarize(&self, texts: &[String], max_tokens: usize) -> Result<String, ProviderError> {
        let summary = extractive_summary(texts, max_tokens);
        if summary.is_empty() {
            return Err(ProviderError::InvalidInput(
                "nothing to summarize".to_string(),
            ));
        }
        Ok(summary)
    }
}

/// Extractive QA: returns the context sentences sharing the most tokens with
/// the question, in context order.
pub struct ExtractiveQa;

const ANSWER_SENTENCES: usize = 2;

impl QaModel for ExtractiveQa {
    fn answer(&self, context: &str, question: &str) -> Result<String, ProviderError> {
        let question_tokens: Vec<String> = tokenize(question);
        let sentences = split_sentences(context);

        let mut scored: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(i, sentence)| {
                let tokens = tokenize(sentence);
                let overlap = question_tokens
                    .iter()
                    .filter(|q| tokens.contains(q))
                    .count();
                (i, overlap)
            })
            .filter(|(_, overlap)| *overlap > 0)
            .collect();

        if scored.is_empty() {
            return Ok("The retrieved context does not contain an answer to this question."
                .to_string());
        }

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let mut picked: Vec<usize> = scored.iter().take(ANSWER_SENTENCES).map(|(i, _)| *i).collect();
        picked.sort_unstable();

        Ok(picked
            .into_iter()
            .map(|i| sentences[i].trim())
            .collect::<Vec<_>>()
            .join(" "))
    }
}
