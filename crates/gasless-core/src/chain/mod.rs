//! # Chain Plumbing
//!
//! The relay executes exactly one kind of on-chain action: a contract call
//! taken from a route's first step. This module defines that call, the
//! [`Broadcaster`] seam that submits it, and a JSON-RPC client with endpoint
//! failover.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gasless_core::chain::{Broadcaster, EvmBroadcaster, EvmConfig};
//!
//! let broadcaster = EvmBroadcaster::new(EvmConfig::base(), backend_wallet)?;
//! let tx = broadcaster.send_transaction(&route.first_call()?).await?;
//! ```

#[cfg(feature = "runtime")]
pub mod evm;

use crate::Result;
#[cfg(feature = "runtime")]
use crate::Error;
use crate::types::keccak256_hash;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "runtime")]
pub use evm::{EvmBroadcaster, EvmConfig};

// ============================================================================
// Core Types
// ============================================================================

/// EVM chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const BASE: ChainId = ChainId(8453);
    pub const BASE_SEPOLIA: ChainId = ChainId(84532);

    /// Get the name for this chain
    pub fn name(&self) -> &'static str {
        match self.0 {
            8453 => "Base",
            84532 => "Base Sepolia",
            _ => "Unknown Chain",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

/// Contract call ready to be signed and broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl PreparedCall {
    /// Commitment to the call: `keccak256(to || value || data)`
    ///
    /// Carried in the user-signed swap intent; the relay only executes a call
    /// whose digest matches.
    pub fn digest(&self) -> B256 {
        let mut buf = Vec::with_capacity(20 + 32 + self.data.len());
        buf.extend_from_slice(self.to.as_slice());
        buf.extend_from_slice(&self.value.to_be_bytes::<32>());
        buf.extend_from_slice(&self.data);
        B256::from(keccak256_hash(&buf))
    }
}

/// Transaction hash returned after broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHash {
    /// The transaction hash
    pub hash: String,
    /// Explorer URL (if available)
    pub explorer_url: Option<String>,
}

impl TxHash {
    /// Create a new transaction hash
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            explorer_url: None,
        }
    }

    /// Add explorer URL
    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = Some(url.into());
        self
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

// ============================================================================
// Broadcaster Trait
// ============================================================================

/// Submits a prepared call with the backend's funded key
///
/// Resolves once the node accepts the transaction; inclusion is not awaited.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Address paying for and sending the transaction
    fn sender(&self) -> Address;

    /// Sign and broadcast `call`
    async fn send_transaction(&self, call: &PreparedCall) -> Result<TxHash>;
}

// ============================================================================
// RPC Client (requires runtime feature)
// ============================================================================

/// HTTP JSON-RPC client with failover support
#[cfg(feature = "runtime")]
#[derive(Clone)]
pub struct RpcClient {
    urls: Vec<String>,
    client: reqwest::Client,
    current_index: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(feature = "runtime")]
impl RpcClient {
    /// Create a new RPC client with failover URLs
    pub fn new(urls: Vec<String>) -> Result<Self> {
        if urls.is_empty() {
            return Err(Error::InvalidConfig("At least one RPC URL required".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Chain(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            urls,
            client,
            current_index: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        })
    }

    fn current_url(&self) -> &str {
        let idx = self
            .current_index
            .load(std::sync::atomic::Ordering::Relaxed);
        &self.urls[idx % self.urls.len()]
    }

    fn rotate_url(&self) {
        self.current_index
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    /// Make a JSON-RPC request, rotating endpoints on failure
    ///
    /// Node-reported errors (a JSON-RPC `error` object) are returned at once;
    /// only transport failures trigger failover.
    pub async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let mut last_error = None;

        for _ in 0..self.urls.len() {
            let url = self.current_url().to_string();

            match self.make_request(&url, method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(RpcFailure::Node(e)) => return Err(e),
                Err(RpcFailure::Transport(e)) => {
                    tracing::warn!(url = %url, method, error = %e, "RPC request failed, rotating endpoint");
                    last_error = Some(e);
                    self.rotate_url();
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Chain("All RPC endpoints failed".into())))
    }

    async fn make_request<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<T, RpcFailure> {
        let request_body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(Error::Chain(format!("RPC request failed: {}", e))))?;

        let response_body: serde_json::Value = response.json().await.map_err(|e| {
            RpcFailure::Transport(Error::Chain(format!("Failed to parse RPC response: {}", e)))
        })?;

        if let Some(error) = response_body.get("error") {
            return Err(RpcFailure::Node(Error::Chain(format!("RPC error: {}", error))));
        }

        let result = response_body
            .get("result")
            .ok_or_else(|| RpcFailure::Transport(Error::Chain("Missing result in RPC response".into())))?;

        serde_json::from_value(result.clone()).map_err(|e| {
            RpcFailure::Node(Error::Chain(format!("Failed to deserialize result: {}", e)))
        })
    }
}

#[cfg(feature = "runtime")]
enum RpcFailure {
    Transport(Error),
    Node(Error),
}

#[cfg(feature = "runtime")]
impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("urls", &self.urls)
            .field(
                "current_index",
                &self
                    .current_index
                    .load(std::sync::atomic::Ordering::Relaxed),
            )
            .finish()
    }
}
