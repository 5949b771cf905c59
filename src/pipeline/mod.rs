//! Deployment pipeline: the capability the worker drives for each commit.
//!
//! The worker only knows [`DeploymentPipeline::run`]; what a deployment
//! involves is up to the implementation. [`DockerStackPipeline`] is the
//! production one:
//!
//! 1. Bring the local checkout of the tracked repository to the commit
//!    ([`checkout`])
//! 2. Find the stack folders under the configured root ([`stacks`])
//! 3. For each stack: `docker build`, `docker push`, `docker stack deploy`
//!
//! External commands run without a timeout. A hung build stalls the worker
//! until it exits.

pub mod checkout;
pub mod command;
pub mod docker;
pub mod stacks;

use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::CommitId;

pub use docker::DockerStackPipeline;
pub use stacks::{COMPOSE_FILE, Stack, discover_stacks};

/// Runs a deployment for one commit.
///
/// Implementations must tolerate being asked to deploy the same commit more
/// than once: webhook redeliveries are not deduplicated.
///
/// # Example (fake for testing)
///
/// ```ignore
/// struct AlwaysOk;
///
/// impl DeploymentPipeline for AlwaysOk {
///     type Error = std::convert::Infallible;
///
///     async fn run(&self, _commit: &CommitId) -> Result<(), Self::Error> {
///         Ok(())
///     }
/// }
/// ```
pub trait DeploymentPipeline: Send + Sync + 'static {
    /// The error type returned by this pipeline.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Deploys `commit`, resolving once the deployment succeeded or failed.
    fn run(
        &self,
        commit: &CommitId,
    ) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send;
}

/// Errors from the docker stack pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The commit id cannot be used as a checkout target and image tag.
    #[error("commit id {0:?} is not a valid image tag")]
    InvalidCommit(String),

    /// An external command could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external command exited unsuccessfully.
    #[error("`{command}` failed ({status})\nstderr: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Filesystem error while preparing the deployment.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
