//! Liveness check.
//!
//! The service is alive while it can still accept work, which requires the
//! queue record to exist.

use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use super::AppState;

/// Health check handler.
///
/// Returns 200 "OK", or 503 when the queue record has gone missing.
///
/// # Example
///
/// ```ignore
/// GET /health HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: text/plain
///
/// OK
/// ```
pub async fn health_handler(State(app_state): State<AppState>) -> (StatusCode, &'static str) {
    if app_state.queue().path().is_file() {
        (StatusCode::OK, "OK")
    } else {
        warn!(
            queue = %app_state.queue().path().display(),
            "Health check failed: queue file missing"
        );
        (StatusCode::SERVICE_UNAVAILABLE, "Queue unavailable")
    }
}
