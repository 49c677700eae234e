//! Content digests
//!
//! BLAKE3 is used for local content addressing and key derivation.
//! Keccak-256 is used wherever a digest is handed to a contract.

/// BLAKE3 digest of arbitrary content
pub fn content_digest(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Keccak-256 digest, matching Solidity's `keccak256`
pub fn keccak_digest(data: &[u8]) -> [u8; 32] {
    alloy_primitives::keccak256(data).0
}

/// Derive 32 bytes of key material bound to a context string
pub fn derive_key(context: &str, key_material: &[u8]) -> [u8; 32] {
    blake3::derive_key(context, key_material)
}
