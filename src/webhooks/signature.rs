//! HMAC-SHA256 verification of webhook deliveries.
//!
//! GitHub signs each delivery with the hook's shared secret and sends the
//! digest in the `X-Hub-Signature-256` header as `sha256=<hex>`. The digest
//! covers the request body exactly as sent, so verification must run on the
//! raw bytes before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix GitHub puts in front of the hex digest.
const SHA256_PREFIX: &str = "sha256=";

/// Decodes a `sha256=<hex>` header value into digest bytes.
///
/// Returns `None` when the prefix is missing or the hex is malformed.
///
/// ```
/// use gitops_webhook::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=00ff"), Some(vec![0x00, 0xff]));
/// assert!(parse_signature_header("sha1=00ff").is_none());
/// assert!(parse_signature_header("sha256=not-hex").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    hex::decode(header.strip_prefix(SHA256_PREFIX)?).ok()
}

/// Computes the HMAC-SHA256 digest of `payload` keyed with `secret`.
pub fn compute_signature(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Renders a digest as a `sha256=<hex>` header value.
pub fn format_signature_header(digest: &[u8]) -> String {
    format!("{SHA256_PREFIX}{}", hex::encode(digest))
}

/// Signs `payload` and returns the header value GitHub would send.
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> String {
    format_signature_header(&compute_signature(secret, payload))
}

/// Checks a delivery's signature header against its raw body.
///
/// Malformed headers verify as `false`. The digest comparison is constant
/// time (`Mac::verify_slice`).
///
/// ```
/// use gitops_webhook::webhooks::{sign_payload, verify_signature};
///
/// let body = br#"{"ref":"refs/heads/main","after":"abc123"}"#;
/// let header = sign_payload(b"s3cret", body);
///
/// assert!(verify_signature(b"s3cret", &header, body));
/// assert!(!verify_signature(b"other", &header, body));
/// ```
pub fn verify_signature(secret: &[u8], signature_header: &str, payload: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
