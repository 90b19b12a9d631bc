//! # EIP-712 Typed Data
//!
//! Hashing for the auth policy a wallet signs during the challenge-response
//! handshake. The policy carries `expire` as a `uint256`, while the wire
//! `auth_request` carries the same value as a decimal string.
//!
//! ```text
//! digest = keccak256(0x19 || 0x01 || domainSeparator || hashStruct(Policy))
//! ```

use crate::types::keccak256_hash;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Type string for the auth policy, with referenced types appended
pub const POLICY_TYPE: &str = "Policy(string challenge,string scope,address wallet,address application,address participant,uint256 expire,Allowance[] allowances)Allowance(string asset,uint256 amount)";

/// Type string for a single allowance
pub const ALLOWANCE_TYPE: &str = "Allowance(string asset,uint256 amount)";

/// Encodable EIP-712 field value
#[derive(Debug, Clone)]
pub enum TypedValue {
    /// Dynamic string, hashed
    String(String),
    Address(Address),
    Uint(U256),
    /// Pre-hashed struct, array or bytes32
    Hash([u8; 32]),
}

impl TypedValue {
    fn encode(&self) -> [u8; 32] {
        match self {
            TypedValue::String(s) => keccak256_hash(s.as_bytes()),
            TypedValue::Address(a) => {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(a.as_slice());
                word
            }
            TypedValue::Uint(v) => v.to_be_bytes::<32>(),
            TypedValue::Hash(h) => *h,
        }
    }
}

/// `hashStruct(s) = keccak256(typeHash || encodeData(s))`
pub fn hash_struct(type_string: &str, values: &[TypedValue]) -> [u8; 32] {
    let mut data = Vec::with_capacity(32 * (values.len() + 1));
    data.extend_from_slice(&keccak256_hash(type_string.as_bytes()));
    for value in values {
        data.extend_from_slice(&value.encode());
    }
    keccak256_hash(&data)
}

/// Hash of a struct array: keccak of the concatenated member hashes
pub fn hash_array(hashes: &[[u8; 32]]) -> [u8; 32] {
    keccak256_hash(&hashes.concat())
}

/// Final digest over a domain and a struct hash
pub fn typed_data_hash(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(66);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(domain_separator);
    data.extend_from_slice(struct_hash);
    keccak256_hash(&data)
}

// ============================================================================
// Domain
// ============================================================================

/// EIP-712 signing domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    /// Omitted from the domain type when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<Address>,
}

impl Eip712Domain {
    pub fn new(name: impl Into<String>, version: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract: None,
        }
    }

    pub fn with_verifying_contract(mut self, contract: Address) -> Self {
        self.verifying_contract = Some(contract);
        self
    }

    fn type_string(&self) -> &'static str {
        if self.verifying_contract.is_some() {
            "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)"
        } else {
            "EIP712Domain(string name,string version,uint256 chainId)"
        }
    }

    /// Domain separator
    pub fn separator(&self) -> [u8; 32] {
        let mut values = vec![
            TypedValue::String(self.name.clone()),
            TypedValue::String(self.version.clone()),
            TypedValue::Uint(U256::from(self.chain_id)),
        ];
        if let Some(contract) = self.verifying_contract {
            values.push(TypedValue::Address(contract));
        }
        hash_struct(self.type_string(), &values)
    }

    fn type_fields(&self) -> serde_json::Value {
        let mut fields = vec![
            json!({"name": "name", "type": "string"}),
            json!({"name": "version", "type": "string"}),
            json!({"name": "chainId", "type": "uint256"}),
        ];
        if self.verifying_contract.is_some() {
            fields.push(json!({"name": "verifyingContract", "type": "address"}));
        }
        serde_json::Value::Array(fields)
    }
}

// ============================================================================
// Auth Policy
// ============================================================================

/// Spending allowance granted to the session key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub asset: String,
    pub amount: U256,
}

impl Allowance {
    fn struct_hash(&self) -> [u8; 32] {
        hash_struct(
            ALLOWANCE_TYPE,
            &[
                TypedValue::String(self.asset.clone()),
                TypedValue::Uint(self.amount),
            ],
        )
    }
}

/// Auth policy message signed by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPolicy {
    pub challenge: String,
    pub scope: String,
    /// Wallet proving ownership
    pub wallet: Address,
    pub application: Address,
    /// Ephemeral session key address
    pub participant: Address,
    /// Unix seconds
    pub expire: u64,
    pub allowances: Vec<Allowance>,
}

impl AuthPolicy {
    pub fn struct_hash(&self) -> [u8; 32] {
        let allowances: Vec<[u8; 32]> = self.allowances.iter().map(Allowance::struct_hash).collect();
        hash_struct(
            POLICY_TYPE,
            &[
                TypedValue::String(self.challenge.clone()),
                TypedValue::String(self.scope.clone()),
                TypedValue::Address(self.wallet),
                TypedValue::Address(self.application),
                TypedValue::Address(self.participant),
                TypedValue::Uint(U256::from(self.expire)),
                TypedValue::Hash(hash_array(&allowances)),
            ],
        )
    }
}

/// Domain-bound auth policy ready for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTypedData {
    pub domain: Eip712Domain,
    pub message: AuthPolicy,
}

impl AuthTypedData {
    /// EIP-712 digest the wallet signs
    pub fn signing_hash(&self) -> [u8; 32] {
        typed_data_hash(&self.domain.separator(), &self.message.struct_hash())
    }

    /// `eth_signTypedData_v4` request body for external wallets
    pub fn to_json(&self) -> serde_json::Value {
        let mut domain = json!({
            "name": self.domain.name,
            "version": self.domain.version,
            "chainId": self.domain.chain_id,
        });
        if let Some(contract) = self.domain.verifying_contract {
            domain["verifyingContract"] = json!(contract.to_checksum(None));
        }

        let allowances: Vec<_> = self
            .message
            .allowances
            .iter()
            .map(|a| json!({"asset": a.asset, "amount": a.amount.to_string()}))
            .collect();

        json!({
            "types": {
                "EIP712Domain": self.domain.type_fields(),
                "Policy": [
                    {"name": "challenge", "type": "string"},
                    {"name": "scope", "type": "string"},
                    {"name": "wallet", "type": "address"},
                    {"name": "application", "type": "address"},
                    {"name": "participant", "type": "address"},
                    {"name": "expire", "type": "uint256"},
                    {"name": "allowances", "type": "Allowance[]"},
                ],
                "Allowance": [
                    {"name": "asset", "type": "string"},
                    {"name": "amount", "type": "uint256"},
                ],
            },
            "primaryType": "Policy",
            "domain": domain,
            "message": {
                "challenge": self.message.challenge,
                "scope": self.message.scope,
                "wallet": self.message.wallet.to_checksum(None),
                "application": self.message.application.to_checksum(None),
                "participant": self.message.participant.to_checksum(None),
                "expire": self.message.expire,
                "allowances": allowances,
            },
        })
    }
}
