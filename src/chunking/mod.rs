//! Splitting documents into overlapping, sentence-aligned windows
//!
//! A "token" throughout is a whitespace-delimited word, not a model subword.
//! Windows target `chunk_size` tokens and prefer to end at a sentence
//! terminator within ±15% of the target; failing that they end at the
//! whitespace boundary.

use crate::text::ends_sentence;

mod metadata;

pub use metadata::{DocumentFacts, UNKNOWN};

/// Tolerance around the target size for sentence-aligned boundaries, percent.
const BOUNDARY_TOLERANCE_PCT: usize = 15;

/// A chunk of one document, carrying the document's metadata triple.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// The chunk text, whitespace-trimmed at both ends
    pub text: String,
    /// Zero-based document index within the corpus
    pub doc_index: usize,
    /// Zero-based chunk index within the document
    pub chunk_index: usize,
    /// The document's `(sector, company, year)` triple
    pub facts: DocumentFacts,
}

/// Document chunker
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Caller is responsible for `chunk_overlap < chunk_size` (the config
    /// validator enforces it).
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split one document into chunks. Metadata is extracted once from the
    /// whole document and attached to every chunk; `overrides` (from the
    /// ingestion layer) win field-by-field over extraction.
    pub fn chunk_document(
        &self,
        doc_index: usize,
        text: &str,
        overrides: Option<&DocumentFacts>,
    ) -> Vec<Chunk> {
        let spans = token_spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        let mut facts = DocumentFacts::extract(text);
        if let Some(overrides) = overrides {
            facts = facts.overridden_by(overrides);
        }

        let n = spans.len();
        let tolerance = (self.chunk_size * BOUNDARY_TOLERANCE_PCT) / 100;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < n {
            let target = (start + self.chunk_size).min(n);
            let end = if target >= n {
                n
            } else {
                self.sentence_boundary(text, &spans, start, target, tolerance)
                    .unwrap_or(target)
            };

            let slice = &text[spans[start].0..spans[end - 1].1];
            chunks.push(Chunk {
                text: slice.to_string(),
                doc_index,
                chunk_index: chunks.len(),
                facts: facts.clone(),
            });

            if end >= n {
                break;
            }
            start = end.saturating_sub(self.chunk_overlap).max(start + 1);
        }

        chunks
    }

    /// Latest position in `[target - tolerance, target + tolerance]` whose
    /// preceding token ends a sentence.
    fn sentence_boundary(
        &self,
        text: &str,
        spans: &[(usize, usize)],
        start: usize,
        target: usize,
        tolerance: usize,
    ) -> Option<usize> {
        let lo = target.saturating_sub(tolerance).max(start + 1);
        let hi = (target + tolerance).min(spans.len());
        (lo..=hi)
            .rev()
            .find(|&end| ends_sentence(&text[spans[end - 1].0..spans[end - 1].1]))
    }
}

/// Byte ranges of whitespace-delimited tokens.
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let base = text.as_ptr() as usize;
    text.split_whitespace()
        .map(|token| {
            let start = token.as_ptr() as usize - base;
            (start, start + token.len())
        })
        .collect()
}
