pub mod monitoring;
use crate::state::AppState;
use prometheus_client::encoding::text::encode;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use monitoring::SYNC_METRICS;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::error;

async fn health_handler() -> &'static str {
    "Healthy"
}

async fn expose_metrics(state: State<Arc<AppState>>) -> Result<String, StatusCode> {
    let mut buffer = String::new();
    let registry = state.registry.read().await;
    encode(&mut buffer, &registry).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(buffer)
}

/// Initializes [`SYNC_METRICS`] and exposes it, plus build info, through `state.registry`.
pub async fn register_metrics(state: &AppState) {
    let metrics = SYNC_METRICS
        .get_or_init(|| async { monitoring::SyncMetrics::default() })
        .await;
    let mut registry = state.registry.write().await;
    metrics.register(&mut registry, "vod_update");
    monitoring::register_build_info_metric(&mut registry, "vod_sync");
}

/// Serves `/health` and `/metrics` on `addr` until the shutdown token fires.
pub async fn setup_server_with_addr(
    state: Arc<AppState>,
    addr: SocketAddr,
) -> Result<tokio::task::JoinHandle<()>, std::io::Error> {
    let shutdown_token = state.shutdown_token.clone();
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(expose_metrics))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_handle = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
            })
            .await;
        if let Err(err) = served {
            error!(event = "metrics_server_failed", error = %err, "metrics server stopped");
        }
    });

    Ok(server_handle)
}
