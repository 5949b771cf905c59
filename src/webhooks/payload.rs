//! Push event payload.
//!
//! Only the two fields the receiver acts on are modelled; everything else in
//! GitHub's push payload is ignored.

use serde::Deserialize;

use crate::types::CommitId;

/// The fields of a GitHub `push` webhook the service cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushEvent {
    /// Full ref that was pushed, e.g. `refs/heads/main`.
    #[serde(rename = "ref")]
    pub git_ref: String,

    /// Commit the ref points to after the push.
    pub after: CommitId,
}

impl PushEvent {
    /// Parses a push event from a raw (already verified) request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Whether this push targets `tracked_ref`. Exact string equality.
    pub fn targets(&self, tracked_ref: &str) -> bool {
        self.git_ref == tracked_ref
    }
}

/// Builds the full ref name for a branch (`main` → `refs/heads/main`).
pub fn branch_ref(branch: &str) -> String {
    format!("refs/heads/{branch}")
}
