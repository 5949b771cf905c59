//! Deployment worker.
//!
//! A single worker owns the consuming end of the durable queue and feeds
//! commits, strictly in order, to a [`DeploymentPipeline`]. At most one
//! deployment is ever in flight.
//!
//! [`DeploymentPipeline`]: crate::pipeline::DeploymentPipeline

#[allow(clippy::module_inception)]
mod worker;


pub use worker::{DeployWorker, DeploymentOutcome, OutcomeStatus, Result, Step, WorkerError};
