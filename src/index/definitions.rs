use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::index::vector::cosine_similarity;
use crate::models::Definition;

/// A definition plus its embedding for the semantic fallback lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DefinitionEntry {
    definition: Definition,
    embedding: Option<Vec<f32>>,
}

/// Secondary index keyed by normalized defined term.
///
/// Upholds the one-active-definition-per-(term, document) invariant:
/// re-indexing a document replaces its definitions wholesale.
pub struct DefinitionIndex {
    entries: RwLock<Vec<DefinitionEntry>>,
    persist_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DefinitionHit {
    pub definition: Definition,
    pub score: f32,
}

impl DefinitionIndex {
    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        if let Some(parent) = persist_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)
                .context("Failed to read definition index")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Replace a document's definitions. `embeddings` is parallel with
    /// `definitions`; an empty embeddings vec stores entries without a
    /// semantic fallback.
    pub fn replace_document(
        &self,
        doc_id: &str,
        definitions: &[Definition],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|e| e.definition.doc_id != doc_id);

        for (i, definition) in definitions.iter().enumerate() {
            entries.push(DefinitionEntry {
                definition: definition.clone(),
                embedding: embeddings.get(i).cloned(),
            });
        }

        self.persist(&entries)
    }

    pub fn delete_document(&self, doc_id: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|e| e.definition.doc_id != doc_id);
        self.persist(&entries)
    }

    fn persist(&self, entries: &[DefinitionEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp, data).context("Failed to write definition index")?;
        std::fs::rename(&tmp, &self.persist_path)
            .context("Failed to replace definition index")?;
        Ok(())
    }

    /// Exact/near match over normalized terms extracted from the query.
    /// Near means containment in either direction ("business day" matches
    /// a query term "day"); anything fuzzier is the semantic fallback's job.
    pub fn lookup_terms(&self, terms: &[String], limit: usize) -> Vec<DefinitionHit> {
        if terms.is_empty() {
            return Vec::new();
        }

        let entries = self.entries.read();
        let mut hits: Vec<DefinitionHit> = Vec::new();

        for entry in entries.iter() {
            let key = &entry.definition.term_key;
            let best = terms
                .iter()
                .filter_map(|t| {
                    if t == key {
                        Some(1.0f32)
                    } else if key.contains(t.as_str()) || t.contains(key.as_str()) {
                        Some(0.5)
                    } else {
                        None
                    }
                })
                .fold(None::<f32>, |acc, s| Some(acc.map_or(s, |a| a.max(s))));

            if let Some(score) = best {
                hits.push(DefinitionHit {
                    definition: entry.definition.clone(),
                    score,
                });
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }

    /// Semantic fallback over definition embeddings.
    pub fn semantic_search(&self, query_embedding: &[f32], limit: usize) -> Vec<DefinitionHit> {
        let entries = self.entries.read();

        let mut hits: Vec<DefinitionHit> = entries
            .iter()
            .filter_map(|e| {
                let embedding = e.embedding.as_ref()?;
                Some(DefinitionHit {
                    definition: e.definition.clone(),
                    score: cosine_similarity(query_embedding, embedding),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(doc_id: &str, term: &str, text: &str) -> Definition {
        Definition {
            term_key: term.to_lowercase(),
            term: term.to_string(),
            text: text.to_string(),
            doc_id: doc_id.to_string(),
            chunk_id: format!("{doc_id}#c0"),
            page: 1,
        }
    }

    fn open(dir: &tempfile::TempDir) -> DefinitionIndex {
        DefinitionIndex::open_or_create(&dir.path().join("definitions.json")).unwrap()
    }

    #[test]
    fn test_exact_term_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir);
        index
            .replace_document(
                "lease.pdf",
                &[definition("lease.pdf", "Premises", "\"Premises\" means the building.")],
                vec![],
            )
            .unwrap();

        let hits = index.lookup_terms(&["premises".to_string()], 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 1.0);
    }

    #[test]
    fn test_near_match_scores_below_exact() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir);
        index
            .replace_document(
                "lease.pdf",
                &[
                    definition("lease.pdf", "Business Day", "a day banks are open"),
                    definition("lease.pdf", "Day", "a calendar day"),
                ],
                vec![],
            )
            .unwrap();

        let hits = index.lookup_terms(&["day".to_string()], 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].definition.term, "Day");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_replace_enforces_one_definition_per_term_per_doc() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir);
        index
            .replace_document(
                "lease.pdf",
                &[definition("lease.pdf", "Rent", "old meaning")],
                vec![],
            )
            .unwrap();
        index
            .replace_document(
                "lease.pdf",
                &[definition("lease.pdf", "Rent", "new meaning")],
                vec![],
            )
            .unwrap();

        let hits = index.lookup_terms(&["rent".to_string()], 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].definition.text, "new meaning");
    }

    #[test]
    fn test_same_term_in_two_documents_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir);
        index
            .replace_document("a.pdf", &[definition("a.pdf", "Rent", "meaning A")], vec![])
            .unwrap();
        index
            .replace_document("b.pdf", &[definition("b.pdf", "Rent", "meaning B")], vec![])
            .unwrap();

        assert_eq!(index.lookup_terms(&["rent".to_string()], 5).len(), 2);
    }

    #[test]
    fn test_semantic_fallback_ranks_by_cosine() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir);
        index
            .replace_document(
                "lease.pdf",
                &[
                    definition("lease.pdf", "Rent", "monthly payment"),
                    definition("lease.pdf", "Notice", "written notice"),
                ],
                vec![vec![0.9, 0.1], vec![0.1, 0.9]],
            )
            .unwrap();

        let hits = index.semantic_search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].definition.term, "Rent");
    }

    #[test]
    fn test_delete_document_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir);
        index
            .replace_document("a.pdf", &[definition("a.pdf", "Rent", "x")], vec![])
            .unwrap();
        index.delete_document("a.pdf").unwrap();
        assert_eq!(index.entry_count(), 0);
    }

    #[test]
    fn test_empty_terms_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir);
        assert!(index.lookup_terms(&[], 5).is_empty());
    }
}
