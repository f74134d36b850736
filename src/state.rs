use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::Config;
use crate::index::definitions::DefinitionIndex;
use crate::index::lexical::LexicalIndex;
use crate::index::vector::VectorStore;
use crate::llm::cross_encoder::{CrossEncoder, HttpCrossEncoder};
use crate::llm::embeddings::{Embedder, HttpEmbedder};
use crate::models::{SyncPhase, SyncReport};
use crate::search::hybrid::HybridSearch;
use crate::sync::{SyncEngine, SyncState};

/// Shared application state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub lexical: Arc<LexicalIndex>,
    pub vectors: Arc<VectorStore>,
    pub definitions: Arc<DefinitionIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub cross_encoder: Arc<dyn CrossEncoder>,
    pub search: Arc<HybridSearch>,
    pub sync_engine: Arc<SyncEngine>,
    pub sync_state: Arc<RwLock<SyncState>>,
    pub sync_phase: Arc<RwLock<SyncPhase>>,
    pub last_sync: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub last_report: Arc<RwLock<Option<SyncReport>>>,
    /// Held for the duration of a sync run; `try_lock` failing means a
    /// run is already in flight.
    pub sync_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let lexical = Arc::new(LexicalIndex::open_or_create(&config.index_dir())?);
        let vectors = Arc::new(VectorStore::open_or_create(&config.vector_dir())?);
        let definitions = Arc::new(DefinitionIndex::open_or_create(&config.definitions_path())?);

        let http_client = build_http_client()?;
        let embedder: Arc<dyn Embedder> =
            Arc::new(HttpEmbedder::new(http_client.clone(), config.llm.clone()));
        let cross_encoder: Arc<dyn CrossEncoder> =
            Arc::new(HttpCrossEncoder::new(http_client, config.reranker.clone()));

        let search = Arc::new(HybridSearch::new(
            lexical.clone(),
            vectors.clone(),
            definitions.clone(),
            embedder.clone(),
            config.retrieval.clone(),
        ));

        let sync_state = Arc::new(RwLock::new(SyncState::load(&config.sync_state_path())?));
        let sync_phase = Arc::new(RwLock::new(SyncPhase::Idle));

        let sync_engine = Arc::new(SyncEngine::new(
            config.docs_dir(),
            config.sync_state_path(),
            config.chunking.clone(),
            lexical.clone(),
            vectors.clone(),
            definitions.clone(),
            embedder.clone(),
            sync_state.clone(),
            sync_phase.clone(),
        ));

        Ok(Self {
            config,
            lexical,
            vectors,
            definitions,
            embedder,
            cross_encoder,
            search,
            sync_engine,
            sync_state,
            sync_phase,
            last_sync: Arc::new(RwLock::new(None)),
            last_report: Arc::new(RwLock::new(None)),
            sync_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Run a sync and record its outcome. Callers must hold `sync_lock`.
    pub async fn run_sync(&self) -> Result<SyncReport> {
        let report = self.sync_engine.run().await?;
        *self.last_sync.write() = Some(Utc::now());
        *self.last_report.write() = Some(report.clone());
        Ok(report)
    }
}

/// Shared client for the embedding and reranker endpoints. The blanket
/// timeout bounds sync-time embedding calls; a hung model server fails a
/// document instead of stalling the run. The reranker path layers its own
/// shorter per-request timeout on top.
pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_builds_with_timeout() {
        assert!(build_http_client().is_ok());
    }
}
