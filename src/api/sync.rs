use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::models::{DocumentStatus, StatusResponse, SyncReport};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    #[serde(default)]
    pub background: bool,
}

/// POST /api/sync - Trigger a sync run.
///
/// Blocking by default: responds with the full report once the run
/// finishes. With `?background=true` the run is spawned and the response
/// is immediate. Either way an overlapping trigger gets 409.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Query(params): Query<SyncParams>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, String)> {
    let guard = state.sync_lock.clone().try_lock_owned().map_err(|_| {
        (
            StatusCode::CONFLICT,
            "A sync run is already in progress".to_string(),
        )
    })?;

    if params.background {
        let state = state.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = state.run_sync().await {
                tracing::error!("Background sync failed: {e:#}");
            }
        });
        return Ok((StatusCode::ACCEPTED, Json(json!({ "status": "started" }))));
    }

    let report: SyncReport = state
        .run_sync()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Sync failed: {e:#}")))?;
    drop(guard);

    Ok((StatusCode::OK, Json(serde_json::to_value(report).unwrap_or_default())))
}

/// GET /api/status - Index counts, sync phase, and per-document detail.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let sync_state = state.sync_state.read();

    let mut documents: Vec<DocumentStatus> = sync_state
        .documents
        .iter()
        .map(|(doc_id, record)| DocumentStatus {
            doc_id: doc_id.clone(),
            chunk_count: record.chunk_ids.len(),
            definition_count: record.definition_ids.len(),
            synced_at: record.synced_at,
        })
        .collect();
    documents.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));

    Json(StatusResponse {
        document_count: documents.len(),
        chunk_count: state.vectors.entry_count(),
        definition_count: state.definitions.entry_count(),
        sync_phase: *state.sync_phase.read(),
        last_sync: *state.last_sync.read(),
        documents,
    })
}
