//! Hybrid candidate retrieval.
//!
//! Three signals run in parallel against the same question: semantic
//! (cosine over chunk embeddings), lexical (BM25), and definitions
//! (term lookup with a semantic fallback). Results are merged by id with
//! provenance union. Per-signal scores stay separate; nothing is fused
//! before the reranker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::error::EngineError;
use crate::index::definitions::{DefinitionHit, DefinitionIndex};
use crate::index::lexical::{LexicalHit, LexicalIndex};
use crate::index::vector::{SemanticHit, VectorStore};
use crate::llm::embeddings::Embedder;
use crate::models::{Provenance, SearchHit};

pub struct HybridSearch {
    lexical: Arc<LexicalIndex>,
    vectors: Arc<VectorStore>,
    definitions: Arc<DefinitionIndex>,
    embedder: Arc<dyn Embedder>,
    retrieval: RetrievalConfig,
}

impl HybridSearch {
    pub fn new(
        lexical: Arc<LexicalIndex>,
        vectors: Arc<VectorStore>,
        definitions: Arc<DefinitionIndex>,
        embedder: Arc<dyn Embedder>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            lexical,
            vectors,
            definitions,
            embedder,
            retrieval,
        }
    }

    /// Retrieve merged candidates for a question. A signal that fails or
    /// times out contributes nothing; the query still succeeds on the
    /// remaining signals.
    pub async fn retrieve(&self, question: &str) -> Vec<SearchHit> {
        let timeout = Duration::from_millis(self.retrieval.signal_timeout_ms);

        // The query embedding serves both the semantic signal and the
        // definition fallback, so it is computed once up front. Failure
        // degrades those signals to empty rather than failing the query.
        let query_embedding = match tokio::time::timeout(
            timeout,
            self.embedder.embed_one(question),
        )
        .await
        {
            Ok(Ok(embedding)) => Some(embedding),
            Ok(Err(e)) => {
                tracing::warn!("Query embedding failed, semantic signal degraded: {e:#}");
                None
            }
            Err(_) => {
                tracing::warn!(
                    "{}",
                    EngineError::SignalTimeout {
                        signal: "embedding",
                        timeout_ms: self.retrieval.signal_timeout_ms,
                    }
                );
                None
            }
        };

        let (semantic, lexical, definition) = tokio::join!(
            self.semantic_signal(query_embedding.as_deref(), timeout),
            self.lexical_signal(question, timeout),
            self.definition_signal(question, query_embedding.as_deref(), timeout),
        );

        merge_candidates(semantic, lexical, definition, self.retrieval.max_candidates)
    }

    async fn semantic_signal(
        &self,
        query_embedding: Option<&[f32]>,
        timeout: Duration,
    ) -> Vec<SemanticHit> {
        let Some(embedding) = query_embedding else {
            return Vec::new();
        };

        let vectors = self.vectors.clone();
        let embedding = embedding.to_vec();
        let top_k = self.retrieval.semantic_top_k;

        let task =
            tokio::task::spawn_blocking(move || vectors.search(&embedding, top_k));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!("Semantic signal panicked: {e}");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "{}",
                    EngineError::SignalTimeout {
                        signal: "semantic",
                        timeout_ms: self.retrieval.signal_timeout_ms,
                    }
                );
                Vec::new()
            }
        }
    }

    async fn lexical_signal(&self, question: &str, timeout: Duration) -> Vec<LexicalHit> {
        let lexical = self.lexical.clone();
        let question = question.to_string();
        let top_k = self.retrieval.lexical_top_k;

        // Tantivy searches are blocking; keep them off the async runtime.
        let task = tokio::task::spawn_blocking(move || lexical.search(&question, top_k));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(hits))) => hits,
            Ok(Ok(Err(e))) => {
                tracing::warn!("Lexical signal failed: {e:#}");
                Vec::new()
            }
            Ok(Err(e)) => {
                tracing::warn!("Lexical signal panicked: {e}");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "{}",
                    EngineError::SignalTimeout {
                        signal: "lexical",
                        timeout_ms: self.retrieval.signal_timeout_ms,
                    }
                );
                Vec::new()
            }
        }
    }

    async fn definition_signal(
        &self,
        question: &str,
        query_embedding: Option<&[f32]>,
        timeout: Duration,
    ) -> Vec<DefinitionHit> {
        let terms = extract_query_terms(question);
        let definitions = self.definitions.clone();
        let top_k = self.retrieval.definition_top_k;
        let embedding = query_embedding.map(|e| e.to_vec());

        let task = tokio::task::spawn_blocking(move || {
            let hits = definitions.lookup_terms(&terms, top_k);
            if !hits.is_empty() {
                return hits;
            }
            // No term matched; fall back to semantic lookup over
            // definition embeddings.
            match embedding {
                Some(e) => definitions.semantic_search(&e, top_k),
                None => Vec::new(),
            }
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!("Definition signal panicked: {e}");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "{}",
                    EngineError::SignalTimeout {
                        signal: "definition",
                        timeout_ms: self.retrieval.signal_timeout_ms,
                    }
                );
                Vec::new()
            }
        }
    }
}

/// Pull candidate defined terms out of a question: quoted phrases plus
/// capitalized words (defined terms are conventionally capitalized in
/// legal drafting). Terms come back normalized like the index keys.
pub fn extract_query_terms(question: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();

    let mut push = |term: &str| {
        let normalized = term.trim().to_lowercase();
        if normalized.len() >= 2 && !terms.contains(&normalized) {
            terms.push(normalized);
        }
    };

    // Quoted phrases first, both straight and curly quotes.
    let mut rest = question;
    while let Some(start) = rest.find(['"', '\u{201c}']) {
        let after = &rest[start + rest[start..].chars().next().map_or(1, char::len_utf8)..];
        if let Some(end) = after.find(['"', '\u{201d}']) {
            push(&after[..end]);
            let close_len = after[end..].chars().next().map_or(1, char::len_utf8);
            rest = &after[end + close_len..];
        } else {
            break;
        }
    }

    // Capitalized words outside sentence-initial position.
    for (i, word) in question.split_whitespace().enumerate() {
        let cleaned: &str = word.trim_matches(|c: char| !c.is_alphanumeric());
        if i == 0 || cleaned.len() < 2 {
            continue;
        }
        if cleaned.chars().next().is_some_and(|c| c.is_uppercase()) {
            push(cleaned);
        }
    }

    terms
}

/// Merge the three signal result sets by candidate id.
///
/// Chunks found by multiple signals collapse into one candidate with
/// unioned provenance and both per-signal scores. Lexical scores are
/// normalized against the batch maximum so they are comparable with
/// cosine scores for ordering only.
fn merge_candidates(
    semantic: Vec<SemanticHit>,
    lexical: Vec<LexicalHit>,
    definition: Vec<DefinitionHit>,
    max_candidates: usize,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for hit in definition {
        let id = hit.definition.id();
        let seq = seq_from_chunk_id(&hit.definition.chunk_id);
        if !by_id.contains_key(&id) {
            by_id.insert(id.clone(), hits.len());
            hits.push(SearchHit {
                id,
                doc_id: hit.definition.doc_id.clone(),
                seq,
                page: hit.definition.page,
                text: hit.definition.text.clone(),
                semantic_score: None,
                lexical_score: None,
                definition_score: Some(hit.score),
                provenance: Provenance::definition(),
            });
        }
    }

    for hit in semantic {
        match by_id.get(&hit.chunk_id) {
            Some(&i) => {
                hits[i].semantic_score = Some(hit.score);
                hits[i].provenance.merge(Provenance::semantic());
            }
            None => {
                by_id.insert(hit.chunk_id.clone(), hits.len());
                hits.push(SearchHit {
                    id: hit.chunk_id,
                    doc_id: hit.doc_id,
                    seq: hit.seq,
                    page: hit.page,
                    text: hit.text,
                    semantic_score: Some(hit.score),
                    lexical_score: None,
                    definition_score: None,
                    provenance: Provenance::semantic(),
                });
            }
        }
    }

    let max_lexical = lexical.iter().map(|h| h.score).fold(0.0f32, f32::max);
    for hit in lexical {
        let normalized = if max_lexical > 0.0 {
            hit.score / max_lexical
        } else {
            0.0
        };
        match by_id.get(&hit.chunk_id) {
            Some(&i) => {
                hits[i].lexical_score = Some(normalized);
                hits[i].provenance.merge(Provenance::lexical());
            }
            None => {
                by_id.insert(hit.chunk_id.clone(), hits.len());
                hits.push(SearchHit {
                    id: hit.chunk_id,
                    doc_id: hit.doc_id,
                    seq: hit.seq,
                    page: hit.page,
                    text: hit.text,
                    semantic_score: None,
                    lexical_score: Some(normalized),
                    definition_score: None,
                    provenance: Provenance::lexical(),
                });
            }
        }
    }

    // Truncation priority when over budget: definition hits survive
    // first, then multi-signal chunks, then single-signal by score.
    // The sort is stable, so within a tier the signal ordering holds.
    hits.sort_by(|a, b| {
        tier(a)
            .cmp(&tier(b))
            .then_with(|| {
                best_score(b)
                    .partial_cmp(&best_score(a))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    hits.truncate(max_candidates);
    hits
}

fn tier(hit: &SearchHit) -> u8 {
    if hit.provenance.definition {
        0
    } else if hit.provenance.multi_signal() {
        1
    } else {
        2
    }
}

pub(crate) fn best_score(hit: &SearchHit) -> f32 {
    hit.semantic_score
        .unwrap_or(0.0)
        .max(hit.lexical_score.unwrap_or(0.0))
        .max(hit.definition_score.unwrap_or(0.0))
}

fn seq_from_chunk_id(chunk_id: &str) -> usize {
    chunk_id
        .rsplit("#c")
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}
