//! Document sync engine.
//!
//! A sync run scans the documents directory, diffs content hashes against
//! the persisted state, and brings every index in line: added and changed
//! files are re-extracted and re-indexed, deleted files are cascaded out.
//! Documents are processed one at a time and each failure is isolated; a
//! corrupt PDF never blocks the rest of the corpus.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::ChunkingConfig;
use crate::error::EngineError;
use crate::ingest::chunker::chunk_document;
use crate::ingest::definitions::{extract_definitions, looks_like_definitions_section};
use crate::ingest::extract::{self, SUPPORTED_EXTENSIONS};
use crate::index::definitions::DefinitionIndex;
use crate::index::lexical::LexicalIndex;
use crate::index::vector::VectorStore;
use crate::llm::embeddings::Embedder;
use crate::models::{DocumentOutcome, SyncPhase, SyncReport};

/// What the engine knows about one indexed document. The record is
/// committed only after the document's index mutations succeeded, so a
/// failed document is retried on the next run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub content_hash: String,
    pub chunk_ids: Vec<String>,
    pub definition_ids: Vec<String>,
    pub synced_at: DateTime<Utc>,
}

/// Persisted per-document sync state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    pub documents: HashMap<String, DocumentRecord>,
}

impl SyncState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).context("Failed to read sync state")?;
        Ok(serde_json::from_str(&data).unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data).context("Failed to write sync state")?;
        std::fs::rename(&tmp, path).context("Failed to replace sync state")?;
        Ok(())
    }
}

/// A file found on disk during the scan phase.
#[derive(Debug)]
struct ScannedFile {
    doc_id: String,
    path: PathBuf,
    content_hash: String,
}

pub struct SyncEngine {
    docs_dir: PathBuf,
    state_path: PathBuf,
    chunking: ChunkingConfig,
    lexical: Arc<LexicalIndex>,
    vectors: Arc<VectorStore>,
    definitions: Arc<DefinitionIndex>,
    embedder: Arc<dyn Embedder>,
    state: Arc<RwLock<SyncState>>,
    phase: Arc<RwLock<SyncPhase>>,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        docs_dir: PathBuf,
        state_path: PathBuf,
        chunking: ChunkingConfig,
        lexical: Arc<LexicalIndex>,
        vectors: Arc<VectorStore>,
        definitions: Arc<DefinitionIndex>,
        embedder: Arc<dyn Embedder>,
        state: Arc<RwLock<SyncState>>,
        phase: Arc<RwLock<SyncPhase>>,
    ) -> Self {
        Self {
            docs_dir,
            state_path,
            chunking,
            lexical,
            vectors,
            definitions,
            embedder,
            state,
            phase,
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write() = phase;
    }

    /// Run one full sync. Always returns a report; per-document failures
    /// land in `report.failed` instead of aborting the run.
    pub async fn run(&self) -> Result<SyncReport> {
        let result = self.run_inner().await;
        self.set_phase(SyncPhase::Idle);
        result
    }

    async fn run_inner(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        self.set_phase(SyncPhase::Scanning);
        let on_disk = scan_docs_dir(&self.docs_dir)?;
        report.total_on_disk = on_disk.len();

        self.set_phase(SyncPhase::Diffing);
        let known: HashMap<String, String> = {
            let state = self.state.read();
            state
                .documents
                .iter()
                .map(|(id, rec)| (id.clone(), rec.content_hash.clone()))
                .collect()
        };

        let mut to_index: Vec<&ScannedFile> = Vec::new();
        for file in &on_disk {
            match known.get(&file.doc_id) {
                Some(hash) if *hash == file.content_hash => report.unchanged += 1,
                _ => to_index.push(file),
            }
        }

        let on_disk_ids: std::collections::HashSet<&str> =
            on_disk.iter().map(|f| f.doc_id.as_str()).collect();
        let to_remove: Vec<String> = known
            .keys()
            .filter(|id| !on_disk_ids.contains(id.as_str()))
            .cloned()
            .collect();

        tracing::info!(
            to_index = to_index.len(),
            to_remove = to_remove.len(),
            unchanged = report.unchanged,
            "Sync diff computed"
        );

        self.set_phase(SyncPhase::Indexing);
        for file in to_index {
            let outcome = match self.index_document(file).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(doc_id = %file.doc_id, "Indexing failed: {e:#}");
                    DocumentOutcome::Failed(format!("{e:#}"))
                }
            };
            report.record(&file.doc_id, outcome);
        }

        self.set_phase(SyncPhase::Removing);
        for doc_id in &to_remove {
            match self.remove_document(doc_id) {
                Ok(()) => report.record(doc_id, DocumentOutcome::Removed),
                Err(e) => {
                    tracing::warn!(doc_id = %doc_id, "Removal failed: {e:#}");
                    report.record(doc_id, DocumentOutcome::Failed(format!("{e:#}")));
                }
            }
        }

        self.set_phase(SyncPhase::Committing);
        let state = self.state.read().clone();
        state.save(&self.state_path)?;

        tracing::info!(
            indexed = report.indexed.len(),
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Sync complete"
        );

        Ok(report)
    }

    /// Index one added or changed document. The sync state record is
    /// committed only after every index accepted the new content.
    async fn index_document(&self, file: &ScannedFile) -> Result<DocumentOutcome> {
        let doc_id = &file.doc_id;
        let pages = extract::extract_document(&file.path)?;
        let chunks = chunk_document(doc_id, &pages, &self.chunking);

        if chunks.is_empty() {
            // The file extracted cleanly but holds no indexable text.
            // Treat it as intentionally emptied: drop old entries and
            // commit the hash so it is not retried every run.
            self.drop_from_indexes(doc_id)?;
            self.commit_record(doc_id, &file.content_hash, Vec::new(), Vec::new())?;
            return Ok(DocumentOutcome::Skipped);
        }

        let definitions = extract_definitions(doc_id, &chunks);
        if definitions.is_empty() {
            // A chunk that reads like a definitions section without any
            // extractable definition usually means an unrecognized
            // defining phrase; surface it for pattern tuning.
            let flagged = chunks
                .iter()
                .filter(|c| looks_like_definitions_section(&c.text))
                .count();
            if flagged > 0 {
                tracing::debug!(
                    doc_id = %doc_id,
                    flagged,
                    "Definition-like chunks yielded no definitions"
                );
            }
        }

        let chunk_texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let chunk_embeddings = self
            .embedder
            .embed(&chunk_texts)
            .await
            .with_context(|| format!("Embedding failed for {doc_id}"))?;
        anyhow::ensure!(
            chunk_embeddings.len() == chunks.len(),
            "Embedding count mismatch for {doc_id}: {} != {}",
            chunk_embeddings.len(),
            chunks.len()
        );

        let definition_embeddings = if definitions.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = definitions.iter().map(|d| d.text.clone()).collect();
            self.embedder
                .embed(&texts)
                .await
                .with_context(|| format!("Definition embedding failed for {doc_id}"))?
        };

        let write = || -> Result<()> {
            self.lexical.delete_document(doc_id)?;
            self.lexical.index_chunks(&chunks)?;
            self.vectors
                .replace_document(doc_id, &chunks, chunk_embeddings)?;
            self.definitions
                .replace_document(doc_id, &definitions, definition_embeddings)?;
            Ok(())
        };
        write().map_err(|source| EngineError::IndexWrite {
            doc_id: doc_id.clone(),
            source,
        })?;

        let chunk_ids = chunks.iter().map(|c| c.id()).collect();
        let definition_ids = definitions.iter().map(|d| d.id()).collect();
        self.commit_record(doc_id, &file.content_hash, chunk_ids, definition_ids)?;

        tracing::debug!(
            doc_id = %doc_id,
            chunks = chunks.len(),
            definitions = definitions.len(),
            "Document indexed"
        );
        Ok(DocumentOutcome::Indexed)
    }

    /// Delete a document's entries from all three indexes.
    fn drop_from_indexes(&self, doc_id: &str) -> Result<(), EngineError> {
        let write = || -> Result<()> {
            self.lexical.delete_document(doc_id)?;
            self.vectors.delete_document(doc_id)?;
            self.definitions.delete_document(doc_id)?;
            Ok(())
        };
        write().map_err(|source| EngineError::IndexWrite {
            doc_id: doc_id.to_string(),
            source,
        })
    }

    /// Cascade a deleted document out of every index and the sync state.
    fn remove_document(&self, doc_id: &str) -> Result<()> {
        self.drop_from_indexes(doc_id)?;

        let snapshot = {
            let mut state = self.state.write();
            state.documents.remove(doc_id);
            state.clone()
        };
        snapshot.save(&self.state_path)
    }

    fn commit_record(
        &self,
        doc_id: &str,
        content_hash: &str,
        chunk_ids: Vec<String>,
        definition_ids: Vec<String>,
    ) -> Result<()> {
        let snapshot = {
            let mut state = self.state.write();
            state.documents.insert(
                doc_id.to_string(),
                DocumentRecord {
                    content_hash: content_hash.to_string(),
                    chunk_ids,
                    definition_ids,
                    synced_at: Utc::now(),
                },
            );
            state.clone()
        };
        snapshot.save(&self.state_path)
    }
}

/// Scan the documents directory for supported files and hash their
/// contents. Identity is the bare file name, so files must be uniquely
/// named within the directory tree.
fn scan_docs_dir(docs_dir: &Path) -> Result<Vec<ScannedFile>> {
    std::fs::create_dir_all(docs_dir)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(docs_dir).follow_links(true) {
        let entry = entry.context("Failed to walk docs directory")?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let content_hash = format!("{:x}", Sha256::digest(&bytes));

        files.push(ScannedFile {
            doc_id: entry.file_name().to_string_lossy().to_string(),
            path: path.to_path_buf(),
            content_hash,
        });
    }

    files.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use async_trait::async_trait;

    /// Deterministic embedder: a tiny vector derived from byte sums.
    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let sum: u32 = t.bytes().map(u32::from).sum();
                    vec![(sum % 97) as f32, (sum % 89) as f32, 1.0]
                })
                .collect())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        docs_dir: PathBuf,
        engine: SyncEngine,
        state: Arc<RwLock<SyncState>>,
        vectors: Arc<VectorStore>,
        definitions: Arc<DefinitionIndex>,
        lexical: Arc<LexicalIndex>,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let docs_dir = dir.path().join("docs");
        std::fs::create_dir_all(&docs_dir).unwrap();

        let lexical = Arc::new(LexicalIndex::open_or_create(&dir.path().join("index")).unwrap());
        let vectors = Arc::new(VectorStore::open_or_create(&dir.path().join("vectors")).unwrap());
        let definitions = Arc::new(
            DefinitionIndex::open_or_create(&dir.path().join("definitions.json")).unwrap(),
        );
        let state = Arc::new(RwLock::new(SyncState::default()));
        let phase = Arc::new(RwLock::new(SyncPhase::Idle));

        let engine = SyncEngine::new(
            docs_dir.clone(),
            dir.path().join("sync_state.json"),
            ChunkingConfig::default(),
            lexical.clone(),
            vectors.clone(),
            definitions.clone(),
            Arc::new(StubEmbedder),
            state.clone(),
            phase,
        );

        Harness {
            _dir: dir,
            docs_dir,
            engine,
            state,
            vectors,
            definitions,
            lexical,
        }
    }

    #[tokio::test]
    async fn test_first_run_indexes_everything() {
        let h = harness();
        std::fs::write(
            h.docs_dir.join("lease.txt"),
            "The Tenant shall pay rent monthly.\n\n\"Deposit\" means two months of rent.",
        )
        .unwrap();

        let report = h.engine.run().await.unwrap();
        assert_eq!(report.indexed, vec!["lease.txt"]);
        assert_eq!(report.total_on_disk, 1);
        assert!(h.vectors.entry_count() > 0);
        assert_eq!(h.definitions.entry_count(), 1);
        assert!(h.state.read().documents.contains_key("lease.txt"));
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let h = harness();
        std::fs::write(h.docs_dir.join("lease.txt"), "The rent is due monthly.").unwrap();

        h.engine.run().await.unwrap();
        let report = h.engine.run().await.unwrap();

        assert!(report.indexed.is_empty());
        assert_eq!(report.unchanged, 1);
    }

    #[tokio::test]
    async fn test_changed_file_is_reindexed() {
        let h = harness();
        let path = h.docs_dir.join("lease.txt");
        std::fs::write(&path, "Original clause.").unwrap();
        h.engine.run().await.unwrap();

        std::fs::write(&path, "Amended clause with different wording.").unwrap();
        let report = h.engine.run().await.unwrap();

        assert_eq!(report.indexed, vec!["lease.txt"]);
        let hits = h.lexical.search("amended", 10).unwrap();
        assert!(!hits.is_empty());
        let stale = h.lexical.search("original", 10).unwrap();
        assert!(stale.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_file_cascades_out_of_every_index() {
        let h = harness();
        let path = h.docs_dir.join("lease.txt");
        std::fs::write(&path, "\"Rent\" means the monthly payment.").unwrap();
        h.engine.run().await.unwrap();
        assert!(h.vectors.entry_count() > 0);

        std::fs::remove_file(&path).unwrap();
        let report = h.engine.run().await.unwrap();

        assert_eq!(report.removed, vec!["lease.txt"]);
        assert_eq!(h.vectors.entry_count(), 0);
        assert_eq!(h.definitions.entry_count(), 0);
        assert!(h.lexical.search("rent", 10).unwrap().is_empty());
        assert!(!h.state.read().documents.contains_key("lease.txt"));
    }

    #[tokio::test]
    async fn test_emptied_file_is_skipped_and_not_retried() {
        let h = harness();
        let path = h.docs_dir.join("lease.txt");
        std::fs::write(&path, "Some clause text.").unwrap();
        h.engine.run().await.unwrap();

        std::fs::write(&path, "").unwrap();
        let report = h.engine.run().await.unwrap();
        assert_eq!(report.skipped, vec!["lease.txt"]);
        assert_eq!(h.vectors.entry_count(), 0);

        // Hash was committed, so the next run leaves it alone.
        let again = h.engine.run().await.unwrap();
        assert_eq!(again.unchanged, 1);
        assert!(again.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_in_isolation() {
        let h = harness();
        // Invalid UTF-8 makes the text extractor error.
        std::fs::write(h.docs_dir.join("broken.txt"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(h.docs_dir.join("good.txt"), "A valid clause.").unwrap();

        let report = h.engine.run().await.unwrap();

        assert_eq!(report.indexed, vec!["good.txt"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken.txt");
        // Failed documents are not committed, so they retry next run.
        assert!(!h.state.read().documents.contains_key("broken.txt"));
    }

    #[tokio::test]
    async fn test_unsupported_files_are_ignored() {
        let h = harness();
        std::fs::write(h.docs_dir.join("notes.docx"), "ignored").unwrap();

        let report = h.engine.run().await.unwrap();
        assert_eq!(report.total_on_disk, 0);
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let h = harness();
        std::fs::write(h.docs_dir.join("lease.txt"), "Clause.").unwrap();
        h.engine.run().await.unwrap();

        let reloaded = SyncState::load(&h._dir.path().join("sync_state.json")).unwrap();
        assert!(reloaded.documents.contains_key("lease.txt"));
        assert!(!reloaded.documents["lease.txt"].chunk_ids.is_empty());
    }
}
