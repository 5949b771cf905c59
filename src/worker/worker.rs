//! The deployment loop.
//!
//! One worker drains the durable queue, one commit at a time:
//!
//! ```text
//! IDLE ──dequeue──▶ DEQUEUED ──run──▶ RUNNING ──▶ SUCCEEDED | FAILED ──▶ IDLE
//!   │
//!   └─ empty: wait for an enqueue, the poll interval, or shutdown
//! ```
//!
//! Shutdown is only observed while idle or between iterations, so a
//! deployment that has started always runs to completion.

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::config::Config;
use crate::persistence::{DurableQueue, QueueError};
use crate::pipeline::DeploymentPipeline;
use crate::types::CommitId;

/// Errors that stop the worker.
///
/// Deployment failures are not among them; they are logged and the worker
/// moves on.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The queue record is missing or unreadable.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// How a deployment ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded,
    /// The pipeline failed. `error` holds the full error chain.
    Failed { error: String },
}

/// Record of one pipeline run.
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub commit: CommitId,
    pub status: OutcomeStatus,
    pub elapsed: Duration,
}

impl DeploymentOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }
}

/// Result of a single worker iteration.
#[derive(Debug)]
pub enum Step {
    /// The queue was empty.
    Idle,
    /// A commit was dequeued and its deployment ran.
    Deployed(DeploymentOutcome),
}

/// Drains the queue into a deployment pipeline.
pub struct DeployWorker<P> {
    queue: DurableQueue,
    pipeline: P,
    poll_interval: Duration,
}

impl<P: DeploymentPipeline> DeployWorker<P> {
    pub fn new(config: &Config, queue: DurableQueue, pipeline: P) -> Self {
        DeployWorker {
            queue,
            pipeline,
            poll_interval: config.poll_interval,
        }
    }

    /// Runs one iteration: dequeue the head and deploy it.
    ///
    /// The entry is already gone from the queue when the pipeline starts, and
    /// a failed deployment is not re-enqueued.
    pub async fn step(&self) -> Result<Step> {
        let Some(commit) = self.queue.dequeue()? else {
            return Ok(Step::Idle);
        };

        Ok(Step::Deployed(self.deploy(commit).await))
    }

    /// Processes the queue until `shutdown` is cancelled.
    ///
    /// Returns an error only when the queue itself fails.
    #[instrument(skip_all, name = "deploy_worker")]
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(
            queue = %self.queue.path().display(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Deployment worker started"
        );

        let mut succeeded = 0u64;
        let mut failed = 0u64;

        while !shutdown.is_cancelled() {
            match self.step().await {
                Ok(Step::Deployed(outcome)) => {
                    if outcome.succeeded() {
                        succeeded += 1;
                    } else {
                        failed += 1;
                    }
                    continue;
                }
                Ok(Step::Idle) => {}
                Err(e) => {
                    error!(error = %e, "Queue failure, stopping worker");
                    return Err(e);
                }
            }

            debug!("Queue is empty");
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = self.queue.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(succeeded, failed, "Deployment worker stopped");
        Ok(())
    }

    async fn deploy(&self, commit: CommitId) -> DeploymentOutcome {
        info!(commit = %commit, "Processing commit");
        let started = Instant::now();

        let status = match self.pipeline.run(&commit).await {
            Ok(()) => OutcomeStatus::Succeeded,
            Err(e) => OutcomeStatus::Failed {
                error: error_chain(&e),
            },
        };
        let elapsed = started.elapsed();

        match &status {
            OutcomeStatus::Succeeded => {
                info!(
                    commit = %commit,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Processed commit"
                );
            }
            OutcomeStatus::Failed { error } => {
                error!(
                    commit = %commit,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "Failed processing commit"
                );
            }
        }

        DeploymentOutcome {
            commit,
            status,
            elapsed,
        }
    }
}

/// Renders an error with all of its sources, outermost first.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
