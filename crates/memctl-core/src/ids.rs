//! ID minting, timestamps, and content hashing.

use sha2::{Digest, Sha256};

/// Mint an opaque ID: a 3-letter prefix plus 12 hex chars of a UUIDv4.
///
/// Prefixes in use: `MEM` (items), `REV` (revisions), `EVT` (events),
/// `MNT` (mounts).
pub fn generate_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &hex[..12])
}

/// Current UTC time as an ISO-8601 / RFC 3339 string.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// SHA-256 content hash with the `sha256:` prefix used across the store.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

/// Bare SHA-256 hex digest of a string (no prefix). Used for corpus
/// files and audit correlation hashes.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
