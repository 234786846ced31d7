//! Request logging middleware

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{error, info, warn};

/// Log method, URI, status and duration of every request
///
/// Server errors log at ERROR, client errors at WARN, the rest at INFO.
pub async fn log_request(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        error!(%method, %uri, status = status.as_u16(), duration_ms, "Request failed");
    } else if status.is_client_error() {
        warn!(%method, %uri, status = status.as_u16(), duration_ms, "Request rejected");
    } else {
        info!(%method, %uri, status = status.as_u16(), duration_ms, "Request completed");
    }

    response
}
