//! Cryptographic utility functions

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of a string, hex-encoded
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash an email address for conversions-API contact matching.
///
/// Normalizes (trim + lowercase) before hashing, which is what the major
/// ad platforms expect for hashed contact fields.
pub fn hash_email(email: &str) -> String {
    sha256_hex(&email.trim().to_lowercase())
}
