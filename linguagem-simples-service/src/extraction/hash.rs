//! Content hashing for result caching.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of a byte slice, returning a hex string.
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Whether `value` looks like a hash produced by [`compute_content_hash`].
pub fn is_content_hash(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
