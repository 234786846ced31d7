//! HTTP API for the clause retrieval pipeline
//!
//! Every pipeline route requires a bearer token and is callable from any
//! origin. `/health` is open.

pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::{AppState, Caller};

use crate::error::Result;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Build the router with CORS and request logging
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/ingest", post(handlers::ingest_handler))
        .route("/reindex", post(handlers::reindex_handler))
        .route("/delete", post(handlers::delete_handler))
        .route("/query", post(handlers::query_handler))
        .route("/documents", get(handlers::list_documents_handler))
        .route(
            "/documents/{id}/verify",
            get(handlers::verify_document_handler),
        )
        .layer(axum::middleware::from_fn(middleware::log_request))
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn serve(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
