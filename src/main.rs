use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use lexcite::api;
use lexcite::config::Config;
use lexcite::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "Embedding provider: {} ({})",
        config.llm.provider,
        config.llm.base_url
    );
    match &config.reranker.base_url {
        Some(url) => tracing::info!("Reranker: {url}"),
        None => tracing::info!("Reranker: disabled, queries use merge ordering"),
    }

    let state = AppState::new(config.clone())?;

    spawn_scheduled_sync(state.clone());

    let app = Router::new()
        .route("/api/query", post(api::query::query))
        .route("/api/sync", post(api::sync::trigger_sync))
        .route("/api/status", get(api::sync::status))
        .route("/health", get(|| async { "ok" }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Sync once at startup and then on the configured interval. A tick that
/// overlaps a manually triggered run is skipped, not queued.
fn spawn_scheduled_sync(state: AppState) {
    if state.config.sync_interval_mins == 0 {
        tracing::info!("Scheduled sync disabled");
        return;
    }

    let period = Duration::from_secs(state.config.sync_interval_mins * 60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            // First tick fires immediately, giving the startup sync.
            interval.tick().await;
            match state.sync_lock.clone().try_lock_owned() {
                Ok(_guard) => {
                    if let Err(e) = state.run_sync().await {
                        tracing::error!("Scheduled sync failed: {e:#}");
                    }
                }
                Err(_) => {
                    tracing::debug!("Scheduled sync skipped, a run is in progress");
                }
            }
        }
    });
}
