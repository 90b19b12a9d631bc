//! # Clearing Node Wire Envelope
//!
//! Requests and responses are carried as compact arrays:
//!
//! ```text
//! request:  {"req": [id, method, params, timestamp], "sig": ["0x.."]}
//! response: {"res": [id, method, result, timestamp], "sig": ["0x.."]}
//! ```
//!
//! A response whose method is [`methods::ERROR`] carries a human-readable
//! reason and may not echo the request id.

use crate::eip712::Allowance;
use crate::types::{Signature, now_millis};
use crate::{Error, Result};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Method tags
pub mod methods {
    pub const AUTH_REQUEST: &str = "auth_request";
    pub const AUTH_CHALLENGE: &str = "auth_challenge";
    pub const AUTH_VERIFY: &str = "auth_verify";
    pub const CREATE_APP_SESSION: &str = "create_app_session";
    pub const STATE_UPDATE: &str = "state_update";
    pub const ERROR: &str = "error";
}

// ============================================================================
// Envelope
// ============================================================================

/// Outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    pub params: Value,
    pub timestamp: u64,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            timestamp: now_millis(),
        }
    }

    /// The `req` array
    pub fn payload(&self) -> Value {
        json!([self.id, self.method, self.params, self.timestamp])
    }

    /// Canonical bytes of the `req` array (object keys sorted)
    pub fn payload_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.payload())?)
    }

    /// Serialize with signatures over [`Self::payload_bytes`]
    pub fn to_envelope(&self, signatures: &[Signature]) -> String {
        let sigs: Vec<String> = signatures.iter().map(Signature::to_hex).collect();
        json!({"req": self.payload(), "sig": sigs}).to_string()
    }

    /// Parse a signed request envelope
    pub fn parse(text: &str) -> Result<(Self, Vec<Signature>)> {
        let envelope: Value = serde_json::from_str(text)?;
        let req = envelope
            .get("req")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Serialization("missing req array".into()))?;
        if req.len() < 3 {
            return Err(Error::Serialization("req array too short".into()));
        }

        let request = Self {
            id: req[0].as_u64().unwrap_or_default(),
            method: req[1]
                .as_str()
                .ok_or_else(|| Error::Serialization("method must be a string".into()))?
                .to_string(),
            params: req[2].clone(),
            timestamp: req.get(3).and_then(Value::as_u64).unwrap_or_default(),
        };

        let signatures = match envelope.get("sig").and_then(Value::as_array) {
            Some(sigs) => sigs
                .iter()
                .map(|s| {
                    s.as_str()
                        .ok_or_else(|| Error::Serialization("signature must be a string".into()))
                        .and_then(Signature::from_hex)
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok((request, signatures))
    }
}

/// Inbound response
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    /// Zero when the relay did not echo an id
    pub id: u64,
    pub method: String,
    pub result: Value,
    pub timestamp: Option<u64>,
}

impl RpcResponse {
    pub fn new(id: u64, method: impl Into<String>, result: Value) -> Self {
        Self {
            id,
            method: method.into(),
            result,
            timestamp: Some(now_millis()),
        }
    }

    /// Error response
    pub fn error(id: u64, reason: impl Into<String>) -> Self {
        Self::new(id, methods::ERROR, json!({"error": reason.into()}))
    }

    /// Parse a response envelope
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Value = serde_json::from_str(text)?;
        let res = envelope
            .get("res")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Serialization("missing res array".into()))?;
        if res.len() < 3 {
            return Err(Error::Serialization("res array too short".into()));
        }

        Ok(Self {
            id: res[0].as_u64().unwrap_or_default(),
            method: res[1]
                .as_str()
                .ok_or_else(|| Error::Serialization("method must be a string".into()))?
                .to_string(),
            result: res[2].clone(),
            timestamp: res.get(3).and_then(Value::as_u64),
        })
    }

    pub fn is_error(&self) -> bool {
        self.method == methods::ERROR
    }

    /// Reason carried by an error response
    pub fn error_reason(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("error") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => self.result.to_string(),
            },
            Value::Array(items) => items
                .first()
                .and_then(|v| v.get("error").or(Some(v)))
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .unwrap_or_else(|| "unknown error".to_string()),
            other => other.to_string(),
        }
    }

    /// Decode the result; a single-element array is unwrapped first
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.result {
            Value::Array(items) if items.len() == 1 => items[0].clone(),
            other => other.clone(),
        };
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_envelope(&self) -> String {
        json!({
            "res": [self.id, self.method, self.result, self.timestamp.unwrap_or_else(now_millis)],
            "sig": [],
        })
        .to_string()
    }
}

/// JSON-RPC 2.0 notification submitting a fully signed state update
pub fn state_update_message<T: Serialize>(update: &T) -> Result<String> {
    Ok(json!({
        "jsonrpc": "2.0",
        "method": methods::STATE_UPDATE,
        "params": [update],
        "id": now_millis(),
    })
    .to_string())
}

// ============================================================================
// Method Payloads
// ============================================================================

/// `auth_request` params
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequestParams {
    /// Wallet being authenticated
    pub address: Address,
    /// Ephemeral session key address
    pub session_key: Address,
    pub app_name: String,
    pub allowances: Vec<Allowance>,
    /// Unix seconds, decimal string on the wire
    pub expire: String,
    pub scope: String,
    pub application: Address,
}

/// `auth_challenge` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge_message: String,
}

/// `auth_verify` params; the signature travels in `sig`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthVerifyParams {
    pub challenge: String,
}

/// `auth_verify` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthVerifyResult {
    pub address: Address,
    pub session_key: Address,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,
}

/// Multi-party session definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDefinition {
    pub protocol: String,
    pub participants: Vec<Address>,
    pub weights: Vec<u32>,
    pub quorum: u32,
    pub challenge: u64,
    pub nonce: u64,
}

/// Initial allocation of one asset to one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAllocation {
    pub participant: Address,
    pub asset: String,
    pub amount: String,
}

/// `create_app_session` params
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAppSessionParams {
    pub definition: AppDefinition,
    pub allocations: Vec<AppAllocation>,
}

/// `create_app_session` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAppSessionResult {
    #[serde(default)]
    pub app_session_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
