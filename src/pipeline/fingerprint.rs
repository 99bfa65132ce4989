//! Content fingerprinting.
//!
//! A SHA-256 hex digest of normalized text. Digests are compared before any
//! diff is computed, so an unchanged page costs one hash.

use sha2::{Digest, Sha256};

/// Digest normalized text.
pub fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
