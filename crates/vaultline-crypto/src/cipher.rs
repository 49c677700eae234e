//! AES-256-GCM envelope encryption
//!
//! Wire layout of a packed payload:
//!
//! ```text
//! ┌──────────────┬───────────────────────────────┐
//! │ nonce (12 B) │ ciphertext ‖ GCM tag (16 B)   │
//! └──────────────┴───────────────────────────────┘
//! ```

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{CryptoError, Result};
use crate::keys::SecretKey;

/// GCM nonce length
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Nonce plus authenticated ciphertext
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::InvalidPayload(format!(
                "payload too short: {} < {}",
                bytes.len(),
                NONCE_LEN + TAG_LEN
            )));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);

        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_LEN..].to_vec(),
        })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidPayload(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

fn cipher(key: &SecretKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Encrypt with a fresh random nonce
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<EncryptedPayload> {
    encrypt_with_aad(key, plaintext, &[])
}

/// Encrypt, binding `aad` into the tag without encrypting it
pub fn encrypt_with_aad(key: &SecretKey, plaintext: &[u8], aad: &[u8]) -> Result<EncryptedPayload> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher(key)
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(nonce.as_slice());

    Ok(EncryptedPayload {
        nonce: nonce_bytes,
        ciphertext,
    })
}

pub fn decrypt(key: &SecretKey, payload: &EncryptedPayload) -> Result<Vec<u8>> {
    decrypt_with_aad(key, payload, &[])
}

pub fn decrypt_with_aad(key: &SecretKey, payload: &EncryptedPayload, aad: &[u8]) -> Result<Vec<u8>> {
    cipher(key)
        .decrypt(
            Nonce::from_slice(&payload.nonce),
            Payload {
                msg: &payload.ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = SecretKey::generate();
        let payload = encrypt(&key, b"last will and testament").unwrap();

        assert_eq!(payload.ciphertext.len(), 23 + TAG_LEN);
        assert_eq!(decrypt(&key, &payload).unwrap(), b"last will and testament");
    }

    #[test]
    fn test_nonce_is_fresh() {
        let key = SecretKey::generate();
        let a = encrypt(&key, b"same").unwrap();
        let b = encrypt(&key, b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let payload = encrypt(&SecretKey::generate(), b"secret").unwrap();
        assert_eq!(
            decrypt(&SecretKey::generate(), &payload),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_tampering_detected() {
        let key = SecretKey::generate();
        let mut payload = encrypt(&key, b"secret").unwrap();
        payload.ciphertext[0] ^= 0x01;
        assert_eq!(decrypt(&key, &payload), Err(CryptoError::DecryptionFailed));

        let mut payload = encrypt(&key, b"secret").unwrap();
        payload.nonce[3] ^= 0x80;
        assert_eq!(decrypt(&key, &payload), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_aad_binding() {
        let key = SecretKey::generate();
        let payload = encrypt_with_aad(&key, b"secret", b"vault:42").unwrap();

        assert_eq!(
            decrypt_with_aad(&key, &payload, b"vault:42").unwrap(),
            b"secret"
        );
        assert!(decrypt_with_aad(&key, &payload, b"vault:43").is_err());
        assert!(decrypt(&key, &payload).is_err());
    }

    #[test]
    fn test_packed_forms() {
        let key = SecretKey::generate();
        let payload = encrypt(&key, b"").unwrap();

        let parsed = EncryptedPayload::from_base64(&payload.to_base64()).unwrap();
        assert_eq!(parsed, payload);
        assert!(decrypt(&key, &parsed).unwrap().is_empty());

        assert!(matches!(
            EncryptedPayload::from_bytes(&[0u8; NONCE_LEN + TAG_LEN - 1]),
            Err(CryptoError::InvalidPayload(_))
        ));
        assert!(EncryptedPayload::from_base64("not base64!").is_err());
    }

    proptest! {
        #[test]
        fn decrypt_inverts_encrypt(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let key = SecretKey::derive("vaultline proptest", &data);
            let payload = encrypt(&key, &data).unwrap();
            let packed = EncryptedPayload::from_bytes(&payload.to_bytes()).unwrap();
            prop_assert_eq!(decrypt(&key, &packed).unwrap(), data);
        }
    }
}
