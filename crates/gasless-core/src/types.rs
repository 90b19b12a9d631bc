//! Core types for gasless swaps
//!
//! This module defines the values that cross component boundaries: recoverable
//! signatures, the role-signed [`StateUpdate`], quotes and swap results.

use crate::route::Route;
use crate::{Error, Result};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of an app session on the clearing node (`0x`-prefixed hex)
pub type SessionId = String;

// ============================================================================
// Signatures
// ============================================================================

/// Recoverable secp256k1 signature (r, s, v)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// R component (32 bytes)
    pub r: [u8; 32],
    /// S component (32 bytes)
    pub s: [u8; 32],
    /// Recovery ID (0 or 1)
    pub recovery_id: u8,
}

impl Signature {
    /// Create a new signature
    pub fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }

    /// Compact bytes (r || s)
    pub fn to_rs_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    /// Ethereum wire bytes (r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&self.to_rs_bytes());
        bytes[64] = self.v();
        bytes
    }

    /// Get v value (27 or 28)
    pub fn v(&self) -> u8 {
        self.recovery_id + 27
    }

    /// Parse 65 wire bytes; accepts v in {0, 1, 27, 28}
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(Error::Signing(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let v = bytes[64];
        let recovery_id = if v >= 27 { v - 27 } else { v };
        if recovery_id > 1 {
            return Err(Error::Signing(format!("invalid signature v value: {v}")));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self::new(r, s, recovery_id))
    }

    /// `0x`-prefixed hex of the wire bytes
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Parse from `0x`-prefixed (or bare) hex
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Role a signer plays on a state update
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerRole {
    /// Wallet owner authorizing the swap
    User,
    /// Relay co-signing and executing the swap
    Counterparty,
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerRole::User => write!(f, "user"),
            SignerRole::Counterparty => write!(f, "counterparty"),
        }
    }
}

/// Signature attached to a state update under a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSignature {
    pub role: SignerRole,
    pub signer: Address,
    pub signature: Signature,
}

// ============================================================================
// State Updates
// ============================================================================

/// Kind of state transition carried by an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    ExecuteSwap,
}

/// Intent payload stored in [`StateUpdate::data`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwapIntent {
    #[serde(rename_all = "camelCase")]
    ExecuteSwap {
        route_id: String,
        session_id: String,
        /// [`PreparedCall::digest`](crate::chain::PreparedCall::digest) of the route's first call
        call_digest: B256,
    },
}

/// Signed change of one participant's allocation of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationDelta {
    pub participant: Address,
    /// Asset identifier as used by the clearing node (e.g. `usdc`)
    pub asset: String,
    #[serde(with = "i128_string")]
    pub delta: i128,
}

/// Versioned, role-signed state transition within a session
///
/// Not valid for execution until it carries both a `user` and a
/// `counterparty` signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub session_id: SessionId,
    pub intent: IntentKind,
    pub version: u64,
    /// JSON-encoded [`SwapIntent`]
    pub data: String,
    pub target: Address,
    pub value: U256,
    #[serde(default)]
    pub allocations: Vec<AllocationDelta>,
    #[serde(default)]
    pub signatures: Vec<RoleSignature>,
}

/// Signed view of an update: every field except the signatures
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigningView<'a> {
    session_id: &'a str,
    intent: IntentKind,
    version: u64,
    data: &'a str,
    target: &'a Address,
    value: &'a U256,
    allocations: &'a [AllocationDelta],
}

impl StateUpdate {
    /// Canonical bytes both signers sign (signatures excluded)
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let view = SigningView {
            session_id: &self.session_id,
            intent: self.intent,
            version: self.version,
            data: &self.data,
            target: &self.target,
            value: &self.value,
            allocations: &self.allocations,
        };
        Ok(serde_json::to_vec(&view)?)
    }

    /// EIP-191 digest of [`Self::signing_payload`]
    pub fn signing_hash(&self) -> Result<[u8; 32]> {
        Ok(crate::signer::hash_eth_message(&self.signing_payload()?))
    }

    /// Decode the intent payload
    pub fn intent_payload(&self) -> Result<SwapIntent> {
        Ok(serde_json::from_str(&self.data)?)
    }

    /// Signature for `role`, if present
    pub fn signature_for(&self, role: SignerRole) -> Option<&RoleSignature> {
        self.signatures.iter().find(|s| s.role == role)
    }

    /// Attach a signature, keeping the list ordered by role
    pub fn add_signature(&mut self, signature: RoleSignature) -> Result<()> {
        if self.signature_for(signature.role).is_some() {
            return Err(Error::InvalidRequest(format!(
                "update already carries a {} signature",
                signature.role
            )));
        }
        self.signatures.push(signature);
        self.signatures.sort_by_key(|s| s.role);
        Ok(())
    }

    /// True when both required signatures are present
    pub fn is_executable(&self) -> bool {
        self.signature_for(SignerRole::User).is_some()
            && self.signature_for(SignerRole::Counterparty).is_some()
    }

    /// Fail unless both required signatures are present
    pub fn ensure_executable(&self) -> Result<()> {
        if !self.is_executable() {
            return Err(Error::InvalidRequest(
                "state update requires both user and counterparty signatures".into(),
            ));
        }
        Ok(())
    }

    /// Per-asset sum of allocation deltas is zero
    pub fn allocations_balanced(&self) -> bool {
        let mut totals: BTreeMap<&str, i128> = BTreeMap::new();
        for delta in &self.allocations {
            let total = totals.entry(delta.asset.as_str()).or_insert(0);
            match total.checked_add(delta.delta) {
                Some(sum) => *total = sum,
                None => return false,
            }
        }
        totals.values().all(|t| *t == 0)
    }
}

// ============================================================================
// Quotes & Results
// ============================================================================

/// Quote for one token conversion, valid for a single execute attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub from_token: Address,
    pub to_token: Address,
    #[serde(with = "u128_string")]
    pub from_amount: u128,
    #[serde(with = "u128_string")]
    pub to_amount: u128,
    pub route: Route,
    /// Percent
    pub price_impact: f64,
    pub estimated_gas: String,
}

/// Terminal outcome of one execute attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SwapResult {
    pub fn success(tx_hash: impl Into<String>) -> Self {
        Self {
            success: true,
            tx_hash: Some(tx_hash.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tx_hash: None,
            error: Some(error.into()),
        }
    }
}

/// Hash data with Keccak256
pub fn keccak256_hash(data: &[u8]) -> [u8; 32] {
    use tiny_keccak::{Hasher, Keccak};
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// Current Unix time in milliseconds
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

mod i128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
