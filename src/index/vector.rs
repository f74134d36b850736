use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::Chunk;

/// A stored chunk embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    chunk_id: String,
    doc_id: String,
    seq: usize,
    page: usize,
    text: String,
    embedding: Vec<f32>,
}

/// In-memory vector store with disk persistence and cosine similarity
/// search. Writes replace a document's entries as a unit; readers see
/// either the old or the new set, never a mix.
pub struct VectorStore {
    entries: RwLock<Vec<VectorEntry>>,
    persist_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub chunk_id: String,
    pub doc_id: String,
    pub seq: usize,
    pub page: usize,
    pub text: String,
    pub score: f32,
}

impl VectorStore {
    pub fn open_or_create(vector_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(vector_dir)?;
        let persist_path = vector_dir.join("vectors.json");

        let entries = if persist_path.exists() {
            let data =
                std::fs::read_to_string(&persist_path).context("Failed to read vector store")?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            persist_path,
        })
    }

    /// Replace a document's vectors. `embeddings` must be parallel with
    /// `chunks`. Old entries for the document are dropped in the same
    /// write-lock scope as the insert.
    pub fn replace_document(
        &self,
        doc_id: &str,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|e| e.doc_id != doc_id);

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            entries.push(VectorEntry {
                chunk_id: chunk.id(),
                doc_id: chunk.doc_id.clone(),
                seq: chunk.seq,
                page: chunk.page,
                text: chunk.text.clone(),
                embedding,
            });
        }

        self.persist(&entries)
    }

    /// Delete all vectors owned by a document.
    pub fn delete_document(&self, doc_id: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|e| e.doc_id != doc_id);
        self.persist(&entries)
    }

    fn persist(&self, entries: &[VectorEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp, data).context("Failed to write vector store")?;
        std::fs::rename(&tmp, &self.persist_path).context("Failed to replace vector store")?;
        Ok(())
    }

    /// Search by cosine similarity against a query embedding.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Vec<SemanticHit> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &VectorEntry)> = entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| SemanticHit {
                chunk_id: e.chunk_id.clone(),
                doc_id: e.doc_id.clone(),
                seq: e.seq,
                page: e.page,
                text: e.text.clone(),
                score,
            })
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Entry counts grouped by owning document.
    pub fn document_counts(&self) -> HashMap<String, usize> {
        let entries = self.entries.read();
        let mut counts = HashMap::new();
        for e in entries.iter() {
            *counts.entry(e.doc_id.clone()).or_insert(0) += 1;
        }
        counts
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
