//! Password hashing
//!
//! Passwords are stored as the standard Base64 encoding of their SHA-256
//! digest, without salt, so rows written by earlier releases keep working.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::digest::{SHA256, digest};

/// Hash a clear-text password for storage
pub fn hash_password(password: &str) -> String {
    STANDARD.encode(digest(&SHA256, password.as_bytes()))
}

/// Check a clear-text password against a stored hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    !stored_hash.is_empty() && hash_password(password) == stored_hash.trim()
}
