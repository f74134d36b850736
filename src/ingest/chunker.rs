//! Legal document chunker.
//!
//! The primary split boundary is a double line-break, which coincides with
//! clause and section boundaries in legal-document formatting. Adjacent
//! paragraphs are merged up to the chunk budget; a paragraph that alone
//! exceeds the budget is split at sentence boundaries, each continuation
//! carrying a trailing-sentence overlap from its predecessor so either side
//! of the cut retains context.

use crate::config::ChunkingConfig;
use crate::ingest::extract::PageText;
use crate::models::Chunk;

/// Split cleaned per-page text into ordered chunks for one document.
///
/// Empty input yields an empty vec, never an error.
pub fn chunk_document(doc_id: &str, pages: &[PageText], cfg: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut seq = 0usize;

    for page in pages {
        for text in chunk_page(&page.text, cfg) {
            chunks.push(Chunk {
                doc_id: doc_id.to_string(),
                seq,
                text,
                page: page.page,
            });
            seq += 1;
        }
    }

    chunks
}

/// Chunk one page of text: paragraph merge, then sentence split for
/// oversized paragraphs.
fn chunk_page(text: &str, cfg: &ChunkingConfig) -> Vec<String> {
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut out = Vec::new();
    let mut acc = String::new();

    for para in paragraphs {
        if para.len() > cfg.max_chars {
            if !acc.is_empty() {
                out.push(std::mem::take(&mut acc));
            }
            out.extend(split_oversized(para, cfg));
        } else if !acc.is_empty() && acc.len() + 2 + para.len() > cfg.max_chars {
            out.push(std::mem::take(&mut acc));
            acc.push_str(para);
        } else {
            if !acc.is_empty() {
                acc.push_str("\n\n");
            }
            acc.push_str(para);
        }
    }

    if !acc.is_empty() {
        out.push(acc);
    }

    out
}

/// Secondary boundary rule: split an over-budget paragraph at sentence
/// boundaries, prefixing each continuation with the previous unit's final
/// sentence(s) up to the overlap budget.
fn split_oversized(para: &str, cfg: &ChunkingConfig) -> Vec<String> {
    let sentences = split_sentences(para);
    if sentences.is_empty() {
        return Vec::new();
    }

    let mut units: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        if !current.is_empty() && current_len + sentence.len() > cfg.max_chars {
            units.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += sentence.len();
        current.push(sentence);
    }
    if !current.is_empty() {
        units.push(current);
    }

    let mut out = Vec::with_capacity(units.len());
    for (i, unit) in units.iter().enumerate() {
        let mut text = String::new();
        if i > 0 {
            for overlap in trailing_overlap(&units[i - 1], cfg.overlap_chars) {
                text.push_str(overlap);
            }
        }
        for sentence in unit {
            text.push_str(sentence);
        }
        out.push(text.trim().to_string());
    }
    out
}

/// The final sentence(s) of a unit whose combined length stays within the
/// overlap budget. A last sentence longer than the whole budget yields an
/// empty overlap; sentences are never carried partially.
fn trailing_overlap<'a>(unit: &[&'a str], budget: usize) -> Vec<&'a str> {
    let mut picked = Vec::new();
    let mut used = 0usize;
    for sentence in unit.iter().rev() {
        if used + sentence.len() > budget {
            break;
        }
        used += sentence.len();
        picked.push(*sentence);
    }
    picked.reverse();
    picked
}

/// Split into sentences, keeping delimiters and whitespace attached so the
/// pieces concatenate back to the original text exactly.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut after_terminator = false;
    let mut after_space = false;

    for (i, c) in text.char_indices() {
        if after_terminator && after_space && !c.is_whitespace() {
            out.push(&text[start..i]);
            start = i;
            after_terminator = false;
            after_space = false;
        }
        if matches!(c, '.' | '?' | '!' | '؟') {
            after_terminator = true;
            after_space = false;
        } else if c.is_whitespace() {
            after_space |= after_terminator;
        } else {
            after_terminator = false;
            after_space = false;
        }
    }

    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars: max,
            overlap_chars: overlap,
        }
    }

    fn page(text: &str) -> Vec<PageText> {
        vec![PageText {
            page: 1,
            text: text.to_string(),
        }]
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        assert!(chunk_document("a.txt", &[], &cfg(1000, 150)).is_empty());
        assert!(chunk_document("a.txt", &page(""), &cfg(1000, 150)).is_empty());
    }

    #[test]
    fn test_small_document_is_single_chunk() {
        let chunks = chunk_document("a.txt", &page("One small clause."), &cfg(1000, 150));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].seq, 0);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].text, "One small clause.");
    }

    #[test]
    fn test_paragraph_boundary_is_primary_split() {
        // Two paragraphs that together exceed the budget split at \n\n,
        // never mid-clause.
        let p1 = "The Tenant shall pay rent monthly. ".repeat(3);
        let p2 = "The Landlord shall maintain the premises. ".repeat(3);
        let text = format!("{}\n\n{}", p1.trim(), p2.trim());

        let chunks = chunk_document("a.txt", &page(&text), &cfg(120, 30));
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.starts_with("The Tenant"));
        assert!(chunks[1].text.starts_with("The Landlord"));
    }

    #[test]
    fn test_small_paragraphs_merge_up_to_budget() {
        let text = "Clause A.\n\nClause B.\n\nClause C.";
        let chunks = chunk_document("a.txt", &page(text), &cfg(1000, 150));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_oversized_paragraph_splits_at_sentences_with_overlap() {
        let sentences: Vec<String> = (0..8)
            .map(|i| format!("Sentence number {i} states a distinct obligation. "))
            .collect();
        let para = sentences.concat();

        let chunks = chunk_document("a.txt", &page(para.trim_end()), &cfg(120, 60));
        assert!(chunks.len() > 1);

        // Each continuation chunk opens with a sentence already present at
        // the end of the previous chunk.
        for pair in chunks.windows(2) {
            let first_sentence_of_next = pair[1].text.split("obligation.").next().unwrap().trim();
            assert!(
                pair[0].text.contains(first_sentence_of_next),
                "continuation should repeat previous chunk's tail"
            );
        }
    }

    #[test]
    fn test_chunk_coverage_reconstructs_document() {
        let sentences: Vec<String> = (0..20)
            .map(|i| format!("Obligation {i} binds the responsible party here. "))
            .collect();
        let para = sentences.concat().trim_end().to_string();
        let text = format!("Intro clause.\n\n{para}\n\nClosing clause.");

        let chunks = chunk_document("a.txt", &page(&text), &cfg(150, 50));

        // Strip each chunk's overlap (the prefix already present at the end
        // of the accumulated text), then compare whitespace-normalized.
        let mut rebuilt = String::new();
        for chunk in &chunks {
            let mut new_part = chunk.text.as_str();
            for cut in (0..chunk.text.len()).rev() {
                if chunk.text.is_char_boundary(cut)
                    && rebuilt.ends_with(chunk.text[..cut].trim_end())
                    && cut > 0
                {
                    new_part = &chunk.text[cut..];
                    break;
                }
            }
            rebuilt.push(' ');
            rebuilt.push_str(new_part);
        }

        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&rebuilt), normalize(&text));
    }

    #[test]
    fn test_sequence_indices_are_monotonic_across_pages() {
        let pages = vec![
            PageText {
                page: 1,
                text: "First page clause.".to_string(),
            },
            PageText {
                page: 2,
                text: "Second page clause.".to_string(),
            },
        ];
        let chunks = chunk_document("a.pdf", &pages, &cfg(1000, 150));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].seq, 0);
        assert_eq!(chunks[1].seq, 1);
        assert_eq!(chunks[1].page, 2);
    }

    #[test]
    fn test_split_sentences_concatenates_back_exactly() {
        let text = "First point. Second point? Third point! Done";
        let sentences = split_sentences(text);
        assert_eq!(sentences.concat(), text);
        assert_eq!(sentences.len(), 4);
    }
}
