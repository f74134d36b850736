//! Context block assembly with positionally aligned citations.

use crate::models::{Citation, RankedHit};

/// Maximum excerpt length carried on a citation.
const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub block: String,
    pub citations: Vec<Citation>,
}

/// Assemble ranked passages into a numbered context block.
///
/// Passages are appended in rank order while the character total of the
/// passages already included stays under `budget_chars`. A passage that
/// crosses the budget is still included whole; nothing is cut mid-passage.
/// Citations align 1:1 with the numbered passages.
pub fn assemble(ranked: &[RankedHit], budget_chars: usize) -> AssembledContext {
    let mut block = String::new();
    let mut citations = Vec::new();
    let mut used = 0usize;

    for ranked_hit in ranked {
        if used >= budget_chars {
            break;
        }

        let n = citations.len() + 1;
        let hit = &ranked_hit.hit;

        if !block.is_empty() {
            block.push_str("\n\n");
        }
        block.push_str(&format!(
            "[{n}] {}\n[Source: {}, page {}]",
            hit.text, hit.doc_id, hit.page
        ));

        citations.push(Citation {
            doc_id: hit.doc_id.clone(),
            page: hit.page,
            excerpt: excerpt(&hit.text),
            rank: ranked_hit.rank,
        });

        used += hit.text.chars().count();
    }

    AssembledContext { block, citations }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provenance, SearchHit};

    fn ranked(doc_id: &str, seq: usize, text: &str, rank: usize) -> RankedHit {
        RankedHit {
            hit: SearchHit {
                id: format!("{doc_id}#c{seq}"),
                doc_id: doc_id.to_string(),
                seq,
                page: seq + 1,
                text: text.to_string(),
                semantic_score: Some(0.8),
                lexical_score: None,
                definition_score: None,
                provenance: Provenance::semantic(),
            },
            score: 0.9,
            rank,
        }
    }

    #[test]
    fn test_citations_align_with_numbered_passages() {
        let hits = vec![
            ranked("lease.pdf", 0, "Rent is due monthly.", 1),
            ranked("policy.pdf", 3, "Notice must be written.", 2),
        ];
        let ctx = assemble(&hits, 6_000);

        assert!(ctx.block.starts_with("[1] Rent is due monthly.\n[Source: lease.pdf, page 1]"));
        assert!(ctx.block.contains("[2] Notice must be written.\n[Source: policy.pdf, page 4]"));
        assert_eq!(ctx.citations.len(), 2);
        assert_eq!(ctx.citations[0].doc_id, "lease.pdf");
        assert_eq!(ctx.citations[1].page, 4);
    }

    #[test]
    fn test_budget_crossing_passage_included_whole() {
        // Two 100-char passages against a 150-char budget: the first
        // uses 100 < 150, so the second still goes in whole. A third
        // would start at 200 >= 150 and is dropped.
        let p = "x".repeat(100);
        let hits = vec![
            ranked("a.pdf", 0, &p, 1),
            ranked("a.pdf", 1, &p, 2),
            ranked("a.pdf", 2, &p, 3),
        ];
        let ctx = assemble(&hits, 150);

        assert_eq!(ctx.citations.len(), 2);
        assert!(ctx.block.contains("[2]"));
        assert!(!ctx.block.contains("[3]"));
    }

    #[test]
    fn test_empty_input_yields_empty_context() {
        let ctx = assemble(&[], 6_000);
        assert!(ctx.block.is_empty());
        assert!(ctx.citations.is_empty());
    }

    #[test]
    fn test_long_passage_excerpt_is_truncated() {
        let long = "word ".repeat(100);
        let hits = vec![ranked("a.pdf", 0, &long, 1)];
        let ctx = assemble(&hits, 6_000);
        assert!(ctx.citations[0].excerpt.chars().count() <= EXCERPT_CHARS + 3);
        assert!(ctx.citations[0].excerpt.ends_with("..."));
    }
}
