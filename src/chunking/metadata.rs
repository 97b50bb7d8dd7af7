//! Per-document metadata extraction
//!
//! Three fields are pulled from the document body by static regex/lexicon
//! tables: `year`, `company`, `sector`. Extraction never fails; a field that
//! cannot be found is the literal sentinel `"unknown"`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Sentinel for a metadata field that could not be extracted
pub const UNKNOWN: &str = "unknown";

/// The `(sector, company, year)` triple attached to every chunk of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFacts {
    #[serde(default = "unknown")]
    pub sector: String,
    #[serde(default = "unknown")]
    pub company: String,
    #[serde(default = "unknown")]
    pub year: String,
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

impl Default for DocumentFacts {
    fn default() -> Self {
        Self {
            sector: unknown(),
            company: unknown(),
            year: unknown(),
        }
    }
}

fn year_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year pattern"))
}

fn company_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b[A-Z][\w&.'-]*(?:\s+(?:[A-Z][\w&.'-]*|&))*\s+(?:Corporation|Company|Corp|Inc|Ltd|LLC|Co\.|Group|PLC|plc|AG|SA)\.?",
        )
        .expect("company pattern")
    })
}

/// Keyword lexicon mapping to canonical sectors, in match-priority order.
/// The canonical names themselves are accepted as keywords so that section
/// headers like "Finance Sector" resolve.
const SECTOR_LEXICON: [(&str, &str); 15] = [
    ("technology", "technology"),
    ("software", "technology"),
    ("bank", "finance"),
    ("financial", "finance"),
    ("insurance", "finance"),
    ("finance", "finance"),
    ("healthcare", "healthcare"),
    ("pharmaceutical", "healthcare"),
    ("energy", "energy"),
    ("oil", "energy"),
    ("gas", "energy"),
    ("retail", "retail"),
    ("manufacturing", "manufacturing"),
    ("real estate", "real estate"),
    ("telecom", "telecom"),
];

fn sector_patterns() -> &'static Vec<(Regex, &'static str)> {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SECTOR_LEXICON
            .iter()
            .map(|(keyword, sector)| {
                let re = Regex::new(&format!(r"(?i)\b{keyword}\b")).expect("sector pattern");
                (re, *sector)
            })
            .collect()
    })
}

impl DocumentFacts {
    /// Extract the metadata triple from a document body. Run once per
    /// document; every chunk of the document carries the same triple.
    pub fn extract(text: &str) -> Self {
        Self {
            sector: extract_sector(text),
            company: extract_company(text),
            year: extract_year(text),
        }
    }

    /// Field-by-field override: caller-supplied values win wherever they are
    /// not the `"unknown"` sentinel.
    pub fn overridden_by(mut self, overrides: &DocumentFacts) -> Self {
        if overrides.sector != UNKNOWN {
            self.sector = overrides.sector.clone();
        }
        if overrides.company != UNKNOWN {
            self.company = overrides.company.clone();
        }
        if overrides.year != UNKNOWN {
            self.year = overrides.year.clone();
        }
        self
    }
}

fn extract_year(text: &str) -> String {
    year_pattern()
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(unknown)
}

fn extract_company(text: &str) -> String {
    company_pattern()
        .find(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches([',', ';', ':', '\'', '"', ')', ']'])
                .to_string()
        })
        .unwrap_or_else(unknown)
}

fn extract_sector(text: &str) -> String {
    for (pattern, sector) in sector_patterns() {
        if pattern.is_match(text) {
            return (*sector).to_string();
        }
    }
    unknown()
}
