use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bounded passage of document text, the atomic retrieval unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    /// Monotonic sequence index within the document.
    pub seq: usize,
    pub text: String,
    /// 1-based page the chunk starts on.
    pub page: usize,
}

impl Chunk {
    /// Stable chunk identity, used as the key in every index.
    pub fn id(&self) -> String {
        format!("{}#c{}", self.doc_id, self.seq)
    }
}

/// An extracted (term -> meaning) record for precise term lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    /// Normalized (trimmed, lowercased) term key.
    pub term_key: String,
    /// The term as it appears in the document.
    pub term: String,
    /// Verbatim definition span.
    pub text: String,
    pub doc_id: String,
    /// Chunk the definition was extracted from, for citation purposes.
    pub chunk_id: String,
    pub page: usize,
}

impl Definition {
    pub fn id(&self) -> String {
        format!("{}#d:{}", self.doc_id, self.term_key)
    }
}

/// Which retrieval signals produced a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub semantic: bool,
    pub lexical: bool,
    pub definition: bool,
}

impl Provenance {
    pub fn semantic() -> Self {
        Self { semantic: true, ..Default::default() }
    }

    pub fn lexical() -> Self {
        Self { lexical: true, ..Default::default() }
    }

    pub fn definition() -> Self {
        Self { definition: true, ..Default::default() }
    }

    /// Union with another provenance tag set.
    pub fn merge(&mut self, other: Provenance) {
        self.semantic |= other.semantic;
        self.lexical |= other.lexical;
        self.definition |= other.definition;
    }

    /// True when found by both the semantic and lexical signals.
    pub fn multi_signal(&self) -> bool {
        self.semantic && self.lexical
    }
}

/// A merged retrieval candidate, before reranking. Per-signal scores are
/// kept separate; no fusion happens at this stage.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Chunk or definition id.
    pub id: String,
    pub doc_id: String,
    /// Sequence index of the underlying chunk (definition hits carry the
    /// seq of their source chunk), used for deterministic tie-breaking.
    pub seq: usize,
    pub page: usize,
    pub text: String,
    pub semantic_score: Option<f32>,
    pub lexical_score: Option<f32>,
    /// Definition lookup score: 1.0 exact term match, 0.5 near match,
    /// cosine for the semantic fallback.
    pub definition_score: Option<f32>,
    pub provenance: Provenance,
}

/// A candidate after precision reranking.
#[derive(Debug, Clone, Serialize)]
pub struct RankedHit {
    #[serde(flatten)]
    pub hit: SearchHit,
    pub score: f32,
    /// 1-based final rank position.
    pub rank: usize,
}

/// Provenance record tying a context passage back to its source.
/// Citations are positionally aligned 1:1 with the context block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub doc_id: String,
    pub page: usize,
    pub excerpt: String,
    pub rank: usize,
}

// ─── Query API types ─────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    Ok,
    /// No signal produced any candidate. Not an error.
    NoContext,
    /// The reranker was unavailable; results follow the merge ordering.
    RerankFallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub question: String,
    pub context_block: String,
    pub citations: Vec<Citation>,
    pub outcome: QueryOutcome,
}

// ─── Sync API types ──────────────────────────────────────

/// Sync engine phase, surfaced by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Scanning,
    Diffing,
    Indexing,
    Removing,
    Committing,
}

/// Per-document outcome of a sync run.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum DocumentOutcome {
    Indexed,
    Removed,
    /// Extracted cleanly but produced zero chunks (presumed intentionally
    /// emptied); old entries were removed.
    Skipped,
    Failed(String),
}

/// Report returned by a blocking sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub indexed: Vec<String>,
    pub removed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub unchanged: usize,
    pub total_on_disk: usize,
}

impl SyncReport {
    pub fn record(&mut self, doc_id: &str, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Indexed => self.indexed.push(doc_id.to_string()),
            DocumentOutcome::Removed => self.removed.push(doc_id.to_string()),
            DocumentOutcome::Skipped => self.skipped.push(doc_id.to_string()),
            DocumentOutcome::Failed(reason) => {
                self.failed.push((doc_id.to_string(), reason))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatus {
    pub doc_id: String,
    pub chunk_count: usize,
    pub definition_count: usize,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub document_count: usize,
    pub chunk_count: usize,
    pub definition_count: usize,
    pub sync_phase: SyncPhase,
    pub last_sync: Option<DateTime<Utc>>,
    pub documents: Vec<DocumentStatus>,
}
