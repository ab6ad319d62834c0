// crates/fluxgate-core/src/core/hashing.rs
// ============================================================================
// Module: Fluxgate Secret Fingerprints
// Description: SHA-256 fingerprints for tokens and device keys.
// Purpose: Let audit records correlate callers without storing secrets.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Tokens and device keys never appear in audit events or error messages.
//! Callers log [`fingerprint_secret`] output instead: a lowercase hex SHA-256
//! digest truncated to a fixed prefix.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of hex characters kept from the digest.
pub const FINGERPRINT_HEX_LEN: usize = 16;

// ============================================================================
// SECTION: Fingerprints
// ============================================================================

/// Returns a truncated lowercase hex SHA-256 fingerprint of a secret.
#[must_use]
pub fn fingerprint_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    let mut encoded = hex_encode(&digest);
    encoded.truncate(FINGERPRINT_HEX_LEN);
    encoded
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[usize::from(byte >> 4)] as char);
        out.push(HEX[usize::from(byte & 0x0f)] as char);
    }
    out
}
