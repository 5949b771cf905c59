//! Newtype wrappers for domain identifiers.

use serde::Deserialize;
use std::fmt;

/// A commit identifier taken from a push webhook's `after` field.
///
/// The value is opaque: in practice it is a 40-character SHA, but nothing in
/// the service interprets it beyond using it as a queue entry, a checkout
/// target and an image tag. Validation for queue storage happens in
/// [`DurableQueue::enqueue`](crate::persistence::DurableQueue::enqueue).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct CommitId(pub String);

impl CommitId {
    /// Creates a new CommitId from a string.
    ///
    /// Note: This does not validate the value.
    pub fn new(s: impl Into<String>) -> Self {
        CommitId(s.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_plain_string() {
        let id: CommitId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(id, CommitId::new("abc123"));
        assert_eq!(id.to_string(), "abc123");
    }
}
