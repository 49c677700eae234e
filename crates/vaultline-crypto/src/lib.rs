//! # Vaultline Cryptography
//!
//! Client-side primitives used before anything leaves the machine:
//!
//! | Function | Algorithm |
//! |----------|-----------|
//! | Content encryption | AES-256-GCM, random 96-bit nonce |
//! | Local digests, key derivation | BLAKE3 |
//! | Contract-facing digests | Keccak-256 |

pub mod cipher;
pub mod error;
pub mod hash;
pub mod keys;

pub use cipher::{decrypt, decrypt_with_aad, encrypt, encrypt_with_aad, EncryptedPayload};
pub use error::{CryptoError, Result};
pub use hash::{content_digest, derive_key, keccak_digest};
pub use keys::SecretKey;
