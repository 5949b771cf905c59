//! Webhook authentication and payload parsing.
//!
//! - [`signature`]: HMAC-SHA256 verification of the `X-Hub-Signature-256` header
//! - [`payload`]: the subset of GitHub's push event the receiver acts on

pub mod payload;
pub mod signature;

pub use payload::{PushEvent, branch_ref};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, sign_payload,
    verify_signature,
};
