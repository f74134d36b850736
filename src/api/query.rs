use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::context;
use crate::models::{QueryOutcome, QueryRequest, QueryResponse};
use crate::search::rerank;
use crate::state::AppState;

/// POST /api/query - Full retrieval pipeline:
///   1. Parallel signal fan-out (semantic + lexical + definitions)
///   2. Merge by id with provenance union, truncate to the candidate cap
///   3. Cross-encoder rerank (merge-order fallback if unavailable)
///   4. Context assembly with positionally aligned citations
pub async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question is required".to_string()));
    }

    let candidates = state.search.retrieve(&question).await;

    if candidates.is_empty() {
        // Every signal came back empty. A well-formed outcome, not an error.
        return Ok(Json(QueryResponse {
            question,
            context_block: String::new(),
            citations: Vec::new(),
            outcome: QueryOutcome::NoContext,
        }));
    }

    let reranked = rerank::rerank(
        state.cross_encoder.as_ref(),
        &question,
        candidates,
        state.config.retrieval.final_top_k,
    )
    .await;

    let assembled = context::assemble(
        &reranked.hits,
        state.config.retrieval.context_budget_chars,
    );

    let outcome = if reranked.fell_back {
        QueryOutcome::RerankFallback
    } else {
        QueryOutcome::Ok
    };

    Ok(Json(QueryResponse {
        question,
        context_block: assembled.block,
        citations: assembled.citations,
        outcome,
    }))
}
