//! Defined-term extraction.
//!
//! Legal documents introduce terms with a small set of defining phrases:
//! a quoted or capitalized term followed by "means", "shall mean", or
//! "refers to" (Hebrew: "פירושו", "משמעותו"). Each match yields a normalized
//! term key and the verbatim definition span, tagged with the chunk it was
//! found in.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::{Chunk, Definition};

/// Matches `"Term" means ...` / `Term shall mean ...` up to the end of the
/// line. The quoted alternative also covers non-Latin terms.
fn definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?m)(?:"(?P<quoted>[^"\n]{2,80})"|(?P<plain>[A-Z][A-Za-z0-9][\w'\- ]{0,60}?))\s+(?:shall mean|means|refers to|פירושו|פירושה|משמעותו)\s+(?P<body>[^\n]+)"#,
        )
        .unwrap()
    })
}

/// Phrases whose density marks a chunk as a likely definitions section.
/// Used by callers that want to log or prioritize, not a gate for
/// extraction itself.
const DEFINITION_SIGNALS: &[&str] = &["means", "shall mean", "refers to", "פירושו", "משמעותו"];

pub fn looks_like_definitions_section(text: &str) -> bool {
    DEFINITION_SIGNALS
        .iter()
        .filter(|sig| text.contains(**sig))
        .count()
        >= 2
}

/// Normalize a term into its index key.
pub fn normalize_term(term: &str) -> String {
    term.trim().trim_matches('"').trim().to_lowercase()
}

/// Extract definitions from a document's chunks.
///
/// Terms are deduplicated per document: a later match for the same
/// normalized term replaces the earlier one (assumed to be a correction or
/// continuation). Returns definitions in first-seen term order.
pub fn extract_definitions(doc_id: &str, chunks: &[Chunk]) -> Vec<Definition> {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Definition> = Vec::new();

    for chunk in chunks {
        for caps in definition_re().captures_iter(&chunk.text) {
            let term = caps
                .name("quoted")
                .or_else(|| caps.name("plain"))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            let body = caps.name("body").map(|m| m.as_str().trim()).unwrap_or_default();

            if term.is_empty() || body.is_empty() {
                continue;
            }

            let term_key = normalize_term(term);
            let definition = Definition {
                term_key: term_key.clone(),
                term: term.to_string(),
                text: caps.get(0).map(|m| m.as_str().trim()).unwrap_or(body).to_string(),
                doc_id: doc_id.to_string(),
                chunk_id: chunk.id(),
                page: chunk.page,
            };

            match by_key.get(&term_key) {
                Some(&i) => out[i] = definition,
                None => {
                    by_key.insert(term_key, out.len());
                    out.push(definition);
                }
            }
        }
    }

    out
}
