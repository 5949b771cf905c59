//! HTTP server for the webhook receiver.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub push deliveries (202 when queued)
//! - `GET /health` - Returns 200 while the queue record is present

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::persistence::DurableQueue;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,

    /// `refs/heads/<branch>` of the tracked branch.
    tracked_ref: String,

    queue: DurableQueue,

    /// Cancelled when a request hits an error the service cannot recover
    /// from. The lifecycle coordinator shuts everything down in response.
    fatal: CancellationToken,
}

impl AppState {
    pub fn new(config: &Config, queue: DurableQueue, fatal: CancellationToken) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret: config.webhook_secret.clone(),
                tracked_ref: config.tracked_ref(),
                queue,
                fatal,
            }),
        }
    }

    /// Returns the webhook secret.
    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn tracked_ref(&self) -> &str {
        &self.inner.tracked_ref
    }

    pub fn queue(&self) -> &DurableQueue {
        &self.inner.queue
    }

    pub fn fatal(&self) -> &CancellationToken {
        &self.inner.fatal
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
