//! Local secp256k1 accounts
//!
//! Keys never leave the process: transactions are signed here (legacy,
//! EIP-155 replay-protected) and submitted with `eth_sendRawTransaction`.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, Header};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use vaultline_core::{Result, VaultlineError};

/// Unsigned legacy transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
}

impl TransactionRequest {
    /// Keccak of the EIP-155 signing payload
    pub fn signing_hash(&self, chain_id: u64) -> B256 {
        let zero = 0u8;
        keccak256(rlp_list(&[
            &self.nonce,
            &self.gas_price,
            &self.gas_limit,
            &self.to,
            &self.value,
            &self.data,
            &chain_id,
            &zero,
            &zero,
        ]))
    }
}

/// Signed, RLP-encoded transaction ready for submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

fn rlp_list(fields: &[&dyn Encodable]) -> Vec<u8> {
    let payload_length: usize = fields.iter().map(|f| f.length()).sum();
    let mut out = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    for field in fields {
        field.encode(&mut out);
    }
    out
}

/// EIP-191 personal message hash
pub fn hash_message(message: &[u8]) -> B256 {
    let mut data = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    data.extend_from_slice(message);
    keccak256(data)
}

fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recover the signer of a 65-byte `r ‖ s ‖ v` signature over `hash`.
/// `v` may be 0/1 or 27/28.
pub fn recover_address(hash: B256, signature: &[u8; 65]) -> Result<Address> {
    let v = match signature[64] {
        v @ 0..=1 => v,
        v @ 27..=28 => v - 27,
        other => {
            return Err(VaultlineError::InvalidArgument(format!(
                "invalid recovery byte {}",
                other
            )))
        }
    };
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| VaultlineError::InvalidArgument(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| VaultlineError::InvalidArgument("invalid recovery id".to_string()))?;
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &sig, recovery_id)
        .map_err(|e| VaultlineError::InvalidArgument(e.to_string()))?;
    Ok(address_of(&key))
}

/// Signing account backed by a local private key
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    address: Address,
}

impl Wallet {
    /// Create a fresh random account
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Load an account from a hex private key, with or without `0x`
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let trimmed = private_key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed)
            .map_err(|e| VaultlineError::InvalidArgument(format!("private key: {}", e)))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|_| VaultlineError::InvalidArgument("private key out of range".to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.to_bytes()))
    }

    /// Sign a 32-byte digest, returning `r ‖ s` and the recovery id (0/1)
    pub fn sign_hash(&self, hash: B256) -> Result<([u8; 64], u8)> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| VaultlineError::Crypto(e.to_string()))?;

        let mut rs = [0u8; 64];
        rs.copy_from_slice(&signature.to_bytes());
        Ok((rs, recovery_id.to_byte()))
    }

    /// EIP-191 personal signature, `r ‖ s ‖ v` with v in {27, 28}
    pub fn sign_message(&self, message: &[u8]) -> Result<[u8; 65]> {
        let (rs, recovery_id) = self.sign_hash(hash_message(message))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&rs);
        out[64] = 27 + recovery_id;
        Ok(out)
    }

    /// Sign a legacy transaction with EIP-155 replay protection
    pub fn sign_transaction(&self, tx: &TransactionRequest, chain_id: u64) -> Result<SignedTransaction> {
        let (rs, recovery_id) = self.sign_hash(tx.signing_hash(chain_id))?;

        let v = u64::from(recovery_id) + 35 + chain_id * 2;
        let r = U256::from_be_slice(&rs[..32]);
        let s = U256::from_be_slice(&rs[32..]);

        let raw = rlp_list(&[
            &tx.nonce,
            &tx.gas_price,
            &tx.gas_limit,
            &tx.to,
            &tx.value,
            &tx.data,
            &v,
            &r,
            &s,
        ]);
        let hash = keccak256(&raw);

        Ok(SignedTransaction {
            raw: Bytes::from(raw),
            hash,
            v,
            r,
            s,
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_address() {
        let wallet = Wallet::from_private_key(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        )
        .unwrap();
        let expected: Address = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23".parse().unwrap();
        assert_eq!(wallet.address(), expected);
    }

    #[test]
    fn test_private_key_roundtrip() {
        let wallet = Wallet::random();
        let restored = Wallet::from_private_key(&wallet.private_key_hex()).unwrap();
        assert_eq!(wallet.address(), restored.address());
        assert!(Wallet::from_private_key("0x1234").is_err());
        assert!(Wallet::from_private_key(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_eip155_reference_transaction() {
        // Reference vector from EIP-155
        let wallet = Wallet::from_private_key(&"46".repeat(32)).unwrap();
        let tx = TransactionRequest {
            to: Address::repeat_byte(0x35),
            data: Bytes::new(),
            value: U256::from(1_000_000_000_000_000_000u128),
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
        };

        assert_eq!(
            hex::encode(tx.signing_hash(1)),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );

        let signed = wallet.sign_transaction(&tx, 1).unwrap();
        assert_eq!(signed.v, 37);
        assert_eq!(
            hex::encode(&signed.raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn test_transaction_signature_recovers_sender() {
        let wallet = Wallet::random();
        let chain_id = 31_337;
        let tx = TransactionRequest {
            to: Address::repeat_byte(0x11),
            data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
            value: U256::ZERO,
            nonce: 0,
            gas_price: 1,
            gas_limit: 100_000,
        };

        let signed = wallet.sign_transaction(&tx, chain_id).unwrap();
        let mut sig = [0u8; 65];
        sig[..32].copy_from_slice(&signed.r.to_be_bytes::<32>());
        sig[32..64].copy_from_slice(&signed.s.to_be_bytes::<32>());
        sig[64] = (signed.v - 35 - chain_id * 2) as u8;

        assert_eq!(
            recover_address(tx.signing_hash(chain_id), &sig).unwrap(),
            wallet.address()
        );
    }

    #[test]
    fn test_personal_sign_recovers() {
        let wallet = Wallet::random();
        let signature = wallet.sign_message(b"check-in vault 7").unwrap();
        assert!(signature[64] == 27 || signature[64] == 28);

        let signer = recover_address(hash_message(b"check-in vault 7"), &signature).unwrap();
        assert_eq!(signer, wallet.address());

        let other = recover_address(hash_message(b"check-in vault 8"), &signature).unwrap();
        assert_ne!(other, wallet.address());
    }
}
