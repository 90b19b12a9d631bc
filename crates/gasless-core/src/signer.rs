//! # Wallet Signing
//!
//! The [`WalletSigner`] trait is the only view the protocol has of a user's
//! wallet. [`LocalWallet`] backs it with an in-process secp256k1 key, and
//! [`SessionKey`] is the ephemeral keypair minted for one auth attempt.

use crate::eip712::AuthTypedData;
use crate::types::{Signature, keccak256_hash};
use crate::{Error, Result};
use alloy_primitives::Address;
use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use zeroize::Zeroizing;

/// Signing capabilities required from a wallet
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Address the wallet signs for
    fn address(&self) -> Address;

    /// EIP-191 personal-sign over `message`
    async fn sign_message(&self, message: &[u8]) -> Result<Signature>;

    /// EIP-712 signature over the auth policy
    async fn sign_typed_data(&self, data: &AuthTypedData) -> Result<Signature>;

    /// Chain the wallet is currently on
    async fn chain_id(&self) -> Result<u64>;

    /// Switch the wallet to `chain_id`, resolving once the switch is confirmed
    async fn switch_chain(&self, chain_id: u64) -> Result<()>;
}

/// EIP-191 digest: `keccak256("\x19Ethereum Signed Message:\n" || len || message)`
pub fn hash_eth_message(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut data = Vec::with_capacity(prefix.len() + message.len());
    data.extend_from_slice(prefix.as_bytes());
    data.extend_from_slice(message);
    keccak256_hash(&data)
}

/// Ethereum address of a public key
pub fn address_of(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    // Skip the 0x04 prefix
    let hash = keccak256_hash(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Sign a 32-byte digest with a recoverable signature
pub fn sign_hash(key: &SigningKey, hash: &[u8; 32]) -> Result<Signature> {
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(hash)
        .map_err(|e| Error::Signing(e.to_string()))?;

    let bytes = sig.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    Ok(Signature::new(r, s, recovery_id.to_byte()))
}

/// Recover the signer address of `hash`
pub fn recover_address(hash: &[u8; 32], signature: &Signature) -> Result<Address> {
    let sig = EcdsaSignature::from_slice(&signature.to_rs_bytes())
        .map_err(|e| Error::Signing(format!("Malformed signature: {}", e)))?;
    let recovery_id = RecoveryId::from_byte(signature.recovery_id)
        .ok_or_else(|| Error::Signing("Invalid recovery id".into()))?;
    let key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|e| Error::Signing(format!("Recovery failed: {}", e)))?;
    Ok(address_of(&key))
}

fn parse_private_key(hex_key: &str) -> Result<SigningKey> {
    let trimmed = hex_key.trim();
    let bytes = Zeroizing::new(hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))?);
    SigningKey::from_slice(&bytes).map_err(|_| Error::InvalidConfig("Invalid private key".into()))
}

// ============================================================================
// Local Wallet
// ============================================================================

/// In-process wallet backed by a secp256k1 key
pub struct LocalWallet {
    key: SigningKey,
    address: Address,
    chain_id: AtomicU64,
}

impl LocalWallet {
    /// Create from a signing key on `chain_id`
    pub fn new(key: SigningKey, chain_id: u64) -> Self {
        let address = address_of(key.verifying_key());
        Self {
            key,
            address,
            chain_id: AtomicU64::new(chain_id),
        }
    }

    /// Parse a `0x`-prefixed or bare hex private key
    pub fn from_private_key_hex(hex_key: &str, chain_id: u64) -> Result<Self> {
        Ok(Self::new(parse_private_key(hex_key)?, chain_id))
    }

    /// Fresh random wallet
    pub fn random(chain_id: u64) -> Self {
        Self::new(SigningKey::random(&mut rand::rngs::OsRng), chain_id)
    }

    /// Sign a raw 32-byte digest
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<Signature> {
        sign_hash(&self.key, hash)
    }
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id.load(Ordering::Relaxed))
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl WalletSigner for LocalWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.sign_hash(&hash_eth_message(message))
    }

    async fn sign_typed_data(&self, data: &AuthTypedData) -> Result<Signature> {
        let current = self.chain_id.load(Ordering::SeqCst);
        if current != data.domain.chain_id {
            return Err(Error::Signing(format!(
                "wallet is on chain {} but typed data targets chain {}",
                current, data.domain.chain_id
            )));
        }
        self.sign_hash(&data.signing_hash())
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id.load(Ordering::SeqCst))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        self.chain_id.store(chain_id, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Session Key
// ============================================================================

/// Ephemeral keypair for a single auth attempt
///
/// Never cloned, serialized or logged; dropped once the attempt finishes.
pub struct SessionKey {
    key: SigningKey,
    address: Address,
}

impl SessionKey {
    /// Generate a fresh keypair
    pub fn generate() -> Self {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// Public address of the key
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a raw 32-byte digest
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<Signature> {
        sign_hash(&self.key, hash)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("address", &self.address)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
