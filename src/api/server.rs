use std::net::SocketAddr;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{info, warn};

use super::{
    services::{
        cancel_upload, create_proposal, download_file, get_upload_status, health, list_proposals,
    },
    state::AppState,
};
use crate::config::Config;
use crate::history::HistoryStore;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build the application router over a prepared state.
///
/// Shared between `run` and the integration tests so the route table exists
/// exactly once.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/proposals", post(create_proposal).get(list_proposals))
        .route("/uploads/{upload_id}", get(get_upload_status))
        .route("/uploads/{upload_id}/cancel", post(cancel_upload))
        .route("/downloads/{filename}", get(download_file))
        .route("/health", get(health))
        .with_state(state)
        // Transparently undo gzip on compressed spreadsheet uploads.
        .layer(RequestDecompressionLayer::new())
}

pub async fn run(address: SocketAddr) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {e}"))?;

    info!(path = %config.server.history_path.display(), "Opening history store");
    let history = HistoryStore::open(&config.server.history_path)
        .map_err(|e| format!("Failed to open history store: {e}"))?;

    std::fs::create_dir_all(&config.documents.output_dir)
        .map_err(|e| format!("Failed to create output directory: {e}"))?;

    // One startup sweep keeps the durable log inside its retention window;
    // fjall is synchronous, so it runs off the async runtime.
    let pruner = history.clone();
    let ttl_days = config.retention.history_ttl_days;
    tokio::task::spawn_blocking(move || {
        if let Err(err) = pruner.prune_expired(ttl_days) {
            warn!(error = %err, "history pruning failed");
        }
    });

    let state = AppState::new(config, history);
    let app = app(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "SheetPress API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
