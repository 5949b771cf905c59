//! gitops-webhook - continuous deployment triggered by GitHub push webhooks.
//!
//! Signed pushes to the tracked branch are appended to a durable on-disk
//! queue; a single worker drains it, deploying every Docker stack of the
//! repository at each queued commit.

pub mod config;
pub mod lifecycle;
pub mod persistence;
pub mod pipeline;
pub mod server;
pub mod types;
pub mod webhooks;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_utils;
