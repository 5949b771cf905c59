//! Durable storage for pending deployments.
//!
//! The only persisted state is the queue record: a plain-text file with one
//! commit id per line, oldest first. It survives restarts; anything still
//! listed when the service stops is deployed after it comes back.
//!
//! # Crash Safety
//!
//! - Appends are fsynced before the receiver acknowledges the webhook
//! - Removals rewrite the record atomically (temp file, fsync, rename, fsync
//!   of the parent directory)
//! - A torn final line left by a crash mid-append is dropped on open

pub mod fsync;
pub mod queue;

pub use queue::{DurableQueue, QueueError};
