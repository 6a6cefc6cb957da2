//! Cryptographic utilities for hashing and secret fingerprinting.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short, non-reversible fingerprint of a secret, safe to include in logs.
pub fn secret_fingerprint(secret: &str) -> String {
    let digest = sha256_hex(secret);
    digest[..12].to_string()
}
