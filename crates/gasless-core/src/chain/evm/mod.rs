//! # EVM Broadcaster
//!
//! Signs and submits route calls as EIP-1559 transactions:
//! - nonce from the pending pool
//! - fees from the latest base fee plus the node's priority fee suggestion
//! - gas estimate with a configurable safety buffer
//! - RPC failover through [`RpcClient`]

use super::{Broadcaster, ChainId, PreparedCall, RpcClient, TxHash};
use crate::signer::{LocalWallet, WalletSigner};
use crate::types::{Signature, keccak256_hash};
use crate::{Error, Result};
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_rlp::{Encodable, RlpEncodable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the EVM broadcaster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmConfig {
    /// Chain identifier
    pub chain_id: ChainId,
    /// RPC endpoint URLs (for failover)
    pub rpc_urls: Vec<String>,
    /// Block explorer URL (optional)
    pub explorer_url: Option<String>,
    /// Percent added on top of the gas estimate
    pub gas_buffer_percent: u64,
}

impl EvmConfig {
    /// Create config for Base
    pub fn base() -> Self {
        Self {
            chain_id: ChainId::BASE,
            rpc_urls: vec![
                "https://mainnet.base.org".to_string(),
                "https://base.llamarpc.com".to_string(),
            ],
            explorer_url: Some("https://basescan.org".to_string()),
            gas_buffer_percent: 20,
        }
    }

    /// Create config for Base Sepolia testnet
    pub fn base_sepolia() -> Self {
        Self {
            chain_id: ChainId::BASE_SEPOLIA,
            rpc_urls: vec!["https://sepolia.base.org".to_string()],
            explorer_url: Some("https://sepolia.basescan.org".to_string()),
            gas_buffer_percent: 20,
        }
    }

    /// Create a custom config
    pub fn custom(chain_id: u64, rpc_urls: Vec<String>) -> Self {
        Self {
            chain_id: ChainId(chain_id),
            rpc_urls,
            explorer_url: None,
            gas_buffer_percent: 20,
        }
    }

    /// Set explorer URL
    pub fn with_explorer(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = Some(url.into());
        self
    }

    /// Set gas buffer
    pub fn with_gas_buffer_percent(mut self, percent: u64) -> Self {
        self.gas_buffer_percent = percent;
        self
    }

    /// Explorer link for a transaction hash
    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), tx_hash))
    }
}

// ============================================================================
// EIP-1559 Transaction Type
// ============================================================================

/// Unsigned EIP-1559 transaction
#[derive(Debug, Clone, RlpEncodable)]
struct Eip1559Transaction {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    access_list: Vec<AccessListItem>,
}

/// Access list item for EIP-2930
#[derive(Debug, Clone, RlpEncodable)]
struct AccessListItem {
    address: Address,
    storage_keys: Vec<B256>,
}

/// EIP-1559 transaction with its signature fields appended
#[derive(Debug, Clone, RlpEncodable)]
struct SignedEip1559Transaction {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    access_list: Vec<AccessListItem>,
    y_parity: u8,
    r: U256,
    s: U256,
}

impl Eip1559Transaction {
    /// `keccak256(0x02 || rlp(tx))`
    fn signing_hash(&self) -> [u8; 32] {
        let mut encoded = vec![0x02];
        self.encode(&mut encoded);
        keccak256_hash(&encoded)
    }

    /// `0x02 || rlp(tx || yParity || r || s)`
    fn encode_signed(&self, signature: &Signature) -> Vec<u8> {
        let signed = SignedEip1559Transaction {
            chain_id: self.chain_id,
            nonce: self.nonce,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            gas_limit: self.gas_limit,
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            access_list: self.access_list.clone(),
            y_parity: signature.recovery_id,
            r: U256::from_be_bytes(signature.r),
            s: U256::from_be_bytes(signature.s),
        };

        let mut raw = vec![0x02];
        signed.encode(&mut raw);
        raw
    }
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Broadcaster signing with the relay's funded key
pub struct EvmBroadcaster {
    config: EvmConfig,
    rpc: RpcClient,
    wallet: Arc<LocalWallet>,
}

impl EvmBroadcaster {
    /// Create a new broadcaster
    pub fn new(config: EvmConfig, wallet: Arc<LocalWallet>) -> Result<Self> {
        let rpc = RpcClient::new(config.rpc_urls.clone())?;
        Ok(Self {
            config,
            rpc,
            wallet,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &EvmConfig {
        &self.config
    }

    async fn pending_nonce(&self) -> Result<u64> {
        let result: String = self
            .rpc
            .request(
                "eth_getTransactionCount",
                serde_json::json!([self.wallet_address(), "pending"]),
            )
            .await?;
        parse_hex_u64(&result)
    }

    /// (max_priority_fee, max_fee)
    async fn fees(&self) -> Result<(u128, u128)> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Block {
            base_fee_per_gas: Option<String>,
        }

        let block: Block = self
            .rpc
            .request(
                "eth_getBlockByNumber",
                serde_json::json!(["latest", false]),
            )
            .await?;

        let priority: u128 = match self
            .rpc
            .request::<String>("eth_maxPriorityFeePerGas", serde_json::json!([]))
            .await
        {
            Ok(tip) => parse_hex_u128(&tip)?,
            Err(e) => {
                tracing::debug!(error = %e, "Priority fee unavailable, using 0.001 gwei");
                1_000_000
            }
        };

        let max_fee = match block.base_fee_per_gas {
            Some(base) => parse_hex_u128(&base)?
                .saturating_mul(2)
                .saturating_add(priority),
            None => {
                let price: String = self
                    .rpc
                    .request("eth_gasPrice", serde_json::json!([]))
                    .await?;
                parse_hex_u128(&price)?.max(priority)
            }
        };

        Ok((priority, max_fee))
    }

    async fn estimate_gas(&self, call: &PreparedCall) -> Result<u64> {
        let result: String = self
            .rpc
            .request(
                "eth_estimateGas",
                serde_json::json!([{
                    "from": self.wallet_address(),
                    "to": format!("{:#x}", call.to),
                    "data": format!("0x{}", hex::encode(&call.data)),
                    "value": format!("{:#x}", call.value),
                }]),
            )
            .await?;
        Ok(apply_gas_buffer(
            parse_hex_u64(&result)?,
            self.config.gas_buffer_percent,
        ))
    }

    fn wallet_address(&self) -> String {
        format!("{:#x}", self.wallet.address())
    }
}

#[async_trait]
impl Broadcaster for EvmBroadcaster {
    fn sender(&self) -> Address {
        self.wallet.address()
    }

    async fn send_transaction(&self, call: &PreparedCall) -> Result<TxHash> {
        let nonce = self.pending_nonce().await?;
        let (max_priority_fee_per_gas, max_fee_per_gas) = self.fees().await?;
        let gas_limit = self.estimate_gas(call).await?;

        let tx = Eip1559Transaction {
            chain_id: self.config.chain_id.0,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to: call.to,
            value: call.value,
            data: call.data.clone(),
            access_list: vec![],
        };

        let signature = self.wallet.sign_hash(&tx.signing_hash())?;
        let raw_hex = format!("0x{}", hex::encode(tx.encode_signed(&signature)));

        let hash: String = self
            .rpc
            .request("eth_sendRawTransaction", serde_json::json!([raw_hex]))
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        tracing::info!(
            tx_hash = %hash,
            nonce,
            gas_limit,
            chain_id = self.config.chain_id.0,
            "Transaction broadcast"
        );

        let mut tx_hash = TxHash::new(hash.clone());
        if let Some(url) = self.config.explorer_tx_url(&hash) {
            tx_hash = tx_hash.with_explorer_url(url);
        }
        Ok(tx_hash)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn apply_gas_buffer(estimate: u64, percent: u64) -> u64 {
    estimate.saturating_add(estimate.saturating_mul(percent) / 100)
}

fn parse_hex_u128(s: &str) -> Result<u128> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u128::from_str_radix(s, 16).map_err(|e| Error::Chain(format!("Failed to parse hex: {}", e)))
}

fn parse_hex_u64(s: &str) -> Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| Error::Chain(format!("Failed to parse hex: {}", e)))
}
