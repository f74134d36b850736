//! Text extraction with legal-grade cleaning.
//!
//! Plain text and markdown are read directly; PDFs go through pdf-extract.
//! Cleaning removes page-number lines, recurring auto-line numbers, and
//! normalizes smart quotes and Hebrew gershayim, but never strips section
//! numbering or clause punctuation.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::EngineError;

/// File extensions the sync engine will pick up.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Cleaned text of one page of a source document.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based page number.
    pub page: usize,
    pub text: String,
}

/// Standalone page-number lines, e.g. "- 3 -", "3", "Page 3".
fn page_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(-\s*)?\d{1,4}(\s*-)?\s*$|^\s*(Page|page|עמוד)\s+\d+\s*$").unwrap()
    })
}

/// Recurring auto-line numbers at start of line, e.g. "  12  WHEREAS ...".
fn line_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s{0,4}\d{1,3}\s{2,}").unwrap())
}

fn collapse_blank_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

/// Quote marks standing in for gershayim inside Hebrew acronyms, e.g.
/// `מע"מ` or `מע''מ`. Normalized to U+05F4 so acronyms tokenize as one
/// word and stray `"` inside Hebrew text cannot open a quoted term.
fn gershayim_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([א-ת])(?:"|'')([א-ת])"#).unwrap())
}

/// Normalize smart quotes and collapse noise while preserving clause
/// punctuation and section numbering.
pub fn clean_text(raw: &str) -> String {
    let mut text: String = raw
        .chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' | '\u{201e}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201a}' => '\'',
            _ => c,
        })
        .collect();

    text = gershayim_re().replace_all(&text, "$1\u{05F4}$2").into_owned();
    text = page_number_re().replace_all(&text, "").into_owned();
    text = line_number_re().replace_all(&text, "").into_owned();
    text = collapse_blank_re().replace_all(&text, "\n\n").into_owned();

    text.trim().to_string()
}

/// Extract cleaned per-page text from a source document.
///
/// Returns `UnsupportedFormat` for unknown extensions and `Extraction` when
/// the file is unreadable. An empty result is not an error; the caller
/// decides how to treat zero-content documents.
pub fn extract_document(path: &Path) -> Result<Vec<PageText>, EngineError> {
    let doc_id = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let raw_pages: Vec<String> = match ext.as_str() {
        "txt" | "md" => {
            let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Extraction {
                doc_id: doc_id.clone(),
                reason: e.to_string(),
            })?;
            vec![raw]
        }
        "pdf" => {
            let raw = pdf_extract::extract_text(path).map_err(|e| EngineError::Extraction {
                doc_id: doc_id.clone(),
                reason: e.to_string(),
            })?;
            // pdf-extract emits a form feed between pages
            raw.split('\u{0c}').map(|p| p.to_string()).collect()
        }
        other => return Err(EngineError::UnsupportedFormat(other.to_string())),
    };

    let pages: Vec<PageText> = raw_pages
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let text = clean_text(raw);
            if text.is_empty() {
                None
            } else {
                Some(PageText { page: i + 1, text })
            }
        })
        .collect();

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_page_number_lines() {
        let raw = "The Tenant shall pay rent.\n- 3 -\nThe Landlord shall maintain the premises.";
        let cleaned = clean_text(raw);
        assert!(!cleaned.contains("- 3 -"));
        assert!(cleaned.contains("Tenant shall pay rent"));
    }

    #[test]
    fn test_clean_strips_auto_line_numbers() {
        let raw = "  12  WHEREAS the parties agree;\n  13  NOW THEREFORE:";
        let cleaned = clean_text(raw);
        assert!(cleaned.starts_with("WHEREAS"));
        assert!(!cleaned.contains("13"));
    }

    #[test]
    fn test_clean_normalizes_smart_quotes() {
        let raw = "\u{201c}Premises\u{201d} means the building.";
        assert_eq!(clean_text(raw), "\"Premises\" means the building.");
    }

    #[test]
    fn test_clean_normalizes_hebrew_gershayim() {
        // Both the ASCII quote and doubled apostrophes collapse to U+05F4.
        assert_eq!(clean_text("מס מע\"מ חל"), "מס מע\u{05F4}מ חל");
        assert_eq!(clean_text("מס מע''מ חל"), "מס מע\u{05F4}מ חל");
        // Curly quotes first normalize to ASCII, then to gershayim.
        assert_eq!(clean_text("מע\u{201d}מ"), "מע\u{05F4}מ");
    }

    #[test]
    fn test_clean_preserves_section_numbering() {
        let raw = "3.1 The deposit is refundable.";
        assert_eq!(clean_text(raw), "3.1 The deposit is refundable.");
    }

    #[test]
    fn test_clean_collapses_blank_runs() {
        let raw = "Clause one.\n\n\n\n\nClause two.";
        assert_eq!(clean_text(raw), "Clause one.\n\nClause two.");
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let err = extract_document(Path::new("contract.xlsx")).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_extract_txt_yields_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "The parties agree to arbitrate.").unwrap();

        let pages = extract_document(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[0].text, "The parties agree to arbitrate.");
    }

    #[test]
    fn test_extract_missing_file_is_extraction_failure() {
        let err = extract_document(Path::new("/nonexistent/x.txt")).unwrap_err();
        assert!(matches!(err, EngineError::Extraction { .. }));
    }

    #[test]
    fn test_extract_empty_file_yields_zero_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();
        assert!(extract_document(&path).unwrap().is_empty());
    }
}
