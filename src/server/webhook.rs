//! Webhook endpoint handler.
//!
//! Authenticates GitHub push deliveries and appends the pushed commit to the
//! durable queue before answering. Deployment happens later, in the worker.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::persistence::QueueError;
use crate::webhooks::{PushEvent, verify_signature};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing or invalid signature.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Body is not a push payload.
    #[error("invalid push payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The pushed commit id cannot be stored in the queue.
    #[error("invalid commit id: {0}")]
    InvalidCommit(String),

    /// The queue could not be written.
    #[error("queue error: {0}")]
    Queue(QueueError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidSignature => StatusCode::FORBIDDEN,
            WebhookError::InvalidPayload(_) | WebhookError::InvalidCommit(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Queue(_) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                    .into_response();
            }
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 202 Accepted: push to the tracked branch, commit queued
/// - 200 OK: `ping` event
/// - 400 Bad Request: not a push payload, or an unusable commit id
/// - 403 Forbidden: missing or invalid signature
/// - 422 Unprocessable Entity: push to another branch
/// - 500 Internal Server Error: queue failure; the service shuts down
///
/// # Example
///
/// ```ignore
/// POST /webhook HTTP/1.1
/// X-GitHub-Event: push
/// X-Hub-Signature-256: sha256=...
/// Content-Type: application/json
///
/// {"ref": "refs/heads/main", "after": "3f2a9c1d...", ...}
///
/// HTTP/1.1 202 Accepted
/// ```
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let signature = header(&headers, HEADER_SIGNATURE).unwrap_or_default();

    // Nothing about the body is trusted until the signature checks out.
    if !verify_signature(app_state.webhook_secret(), signature, &body) {
        warn!(
            has_signature = !signature.is_empty(),
            "Invalid signature"
        );
        return Err(WebhookError::InvalidSignature);
    }

    if header(&headers, HEADER_EVENT) == Some("ping") {
        debug!("Received ping");
        return Ok((StatusCode::OK, "pong"));
    }

    let event = PushEvent::from_slice(&body)?;

    if !event.targets(app_state.tracked_ref()) {
        info!(
            git_ref = %event.git_ref,
            tracked = %app_state.tracked_ref(),
            "Received irrelevant webhook event"
        );
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, "Not relevant"));
    }

    match app_state.queue().enqueue(&event.after) {
        Ok(()) => {
            info!(commit = %event.after, "Queued item");
            Ok((StatusCode::ACCEPTED, "Queued"))
        }
        Err(QueueError::InvalidEntry(id)) => {
            warn!(commit = ?id, "Rejected unusable commit id");
            Err(WebhookError::InvalidCommit(id))
        }
        Err(e) => {
            error!(error = %e, "Failed to queue commit, shutting down");
            app_state.fatal().cancel();
            Err(WebhookError::Queue(e))
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
