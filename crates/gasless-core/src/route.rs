//! # Routes and Quotes
//!
//! A [`Route`] is opaque to the protocol except for its first step, which must
//! expose a call target and call data. [`RouteProvider`] produces quotes;
//! [`MockRouteProvider`] prices at a fixed rate for tests and demos.

use crate::chain::PreparedCall;
use crate::tokens::{self, NATIVE_PLACEHOLDER};
use crate::types::{SwapQuote, keccak256_hash};
use crate::{Error, Result};
use alloy_primitives::{Address, Bytes, U256, address};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Aggregator diamond used as the default call target
pub const DEFAULT_ROUTER: Address = address!("1231DEB6f5749EF6cE6943a275A1D3E7486F4EaE");

/// Candidate execution path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
    /// Provider-specific fields, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One hop of a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_request: Option<CallRequest>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Unsigned call description as returned by aggregators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
}

impl Route {
    /// Validate the first step and extract the call it describes
    pub fn first_call(&self) -> Result<PreparedCall> {
        let step = self
            .steps
            .first()
            .ok_or_else(|| Error::InvalidRoute("route has no steps".into()))?;
        let request = step
            .transaction_request
            .as_ref()
            .ok_or_else(|| Error::InvalidRoute("first step has no transaction request".into()))?;

        let to = match request.to.as_deref().map(str::trim) {
            Some(to) if !to.is_empty() => Address::from_str(to)
                .map_err(|e| Error::InvalidRoute(format!("invalid target address: {}", e)))?,
            _ => return Err(Error::InvalidRoute("first step is missing a target address".into())),
        };

        let data = match request.data.as_deref().map(str::trim) {
            Some(data) if !data.trim_start_matches("0x").is_empty() => {
                let bytes = hex::decode(data.strip_prefix("0x").unwrap_or(data))
                    .map_err(|e| Error::InvalidRoute(format!("invalid call data: {}", e)))?;
                Bytes::from(bytes)
            }
            _ => return Err(Error::InvalidRoute("first step is missing call data".into())),
        };

        let value = match request.value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => U256::from_str(v)
                .map_err(|e| Error::InvalidRoute(format!("invalid call value: {}", e)))?,
            _ => U256::ZERO,
        };

        Ok(PreparedCall { to, data, value })
    }

    /// Source amount declared by the provider (`fromAmount`, base units)
    pub fn from_amount(&self) -> Result<u128> {
        let amount = match self.extra.get("fromAmount") {
            Some(Value::String(s)) => s.trim().parse::<u128>().ok(),
            Some(Value::Number(n)) => n.as_u64().map(u128::from),
            _ => return Err(Error::InvalidRoute("route does not declare fromAmount".into())),
        };
        amount.ok_or_else(|| Error::InvalidRoute("invalid route fromAmount".into()))
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Parameters for a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub from_token: Address,
    pub to_token: Address,
    pub from_amount: u128,
    /// Basis points (50 = 0.5%)
    pub slippage_bps: u32,
}

impl QuoteRequest {
    pub fn new(from_token: Address, to_token: Address, from_amount: u128) -> Self {
        Self {
            from_token,
            to_token,
            from_amount,
            slippage_bps: 50,
        }
    }

    pub fn with_slippage_bps(mut self, bps: u32) -> Self {
        self.slippage_bps = bps;
        self
    }
}

/// Source of execution routes
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Quote a conversion; `None` when no route exists
    async fn get_route(&self, request: &QuoteRequest) -> Result<Option<SwapQuote>>;
}

/// Fixed-price provider for stablecoin into ether
#[derive(Debug, Clone)]
pub struct MockRouteProvider {
    /// Whole stablecoin units per ether
    pub price: u128,
    pub router: Address,
}

impl Default for MockRouteProvider {
    fn default() -> Self {
        Self {
            price: 2500,
            router: DEFAULT_ROUTER,
        }
    }
}

impl MockRouteProvider {
    pub fn with_price(mut self, price: u128) -> Self {
        self.price = price;
        self
    }

    pub fn with_router(mut self, router: Address) -> Self {
        self.router = router;
        self
    }

    /// Output amount after slippage, in destination base units
    pub fn output_amount(&self, request: &QuoteRequest) -> Result<u128> {
        let from = tokens::token_by_address(&request.from_token)
            .ok_or_else(|| Error::InvalidRequest("unknown source token".into()))?;
        let to = tokens::token_by_address(&request.to_token)
            .ok_or_else(|| Error::InvalidRequest("unknown destination token".into()))?;
        if request.slippage_bps > 10_000 {
            return Err(Error::InvalidRequest("slippage above 100%".into()));
        }
        if self.price == 0 {
            return Err(Error::InvalidConfig("price must be non-zero".into()));
        }

        let overflow = || Error::InvalidRequest("amount too large".into());
        let scale_up = 10u128.pow(to.decimals as u32);
        let scale_down = 10u128.pow(from.decimals as u32);
        let numerator = request
            .from_amount
            .checked_mul(scale_up / scale_down.min(scale_up))
            .and_then(|n| n.checked_mul((10_000 - request.slippage_bps) as u128))
            .ok_or_else(overflow)?;
        let denominator = self
            .price
            .checked_mul(10_000)
            .and_then(|d| d.checked_mul(scale_down / scale_down.min(scale_up)))
            .ok_or_else(overflow)?;
        Ok(numerator / denominator)
    }

    fn call_data(&self, request: &QuoteRequest, min_out: u128) -> Vec<u8> {
        let selector = keccak256_hash(b"swap(address,address,uint256,uint256)");
        let mut data = Vec::with_capacity(4 + 32 * 4);
        data.extend_from_slice(&selector[..4]);
        for token in [request.from_token, request.to_token] {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(token.as_slice());
            data.extend_from_slice(&word);
        }
        for amount in [request.from_amount, min_out] {
            data.extend_from_slice(&U256::from(amount).to_be_bytes::<32>());
        }
        data
    }
}

#[async_trait]
impl RouteProvider for MockRouteProvider {
    async fn get_route(&self, request: &QuoteRequest) -> Result<Option<SwapQuote>> {
        if !tokens::is_gasless_available(&request.from_token, &request.to_token) {
            return Ok(None);
        }

        let to_amount = self.output_amount(request)?;
        let to_token = if request.to_token == Address::ZERO {
            NATIVE_PLACEHOLDER
        } else {
            request.to_token
        };

        let call = CallRequest {
            to: Some(self.router.to_checksum(None)),
            data: Some(format!("0x{}", hex::encode(self.call_data(request, to_amount)))),
            value: Some("0".into()),
            gas_limit: None,
            gas_price: None,
        };

        let mut step_extra = Map::new();
        step_extra.insert("tool".into(), Value::String("mock".into()));

        let mut extra = Map::new();
        extra.insert("fromToken".into(), Value::String(request.from_token.to_checksum(None)));
        extra.insert("toToken".into(), Value::String(to_token.to_checksum(None)));
        extra.insert("fromAmount".into(), Value::String(request.from_amount.to_string()));
        extra.insert("toAmount".into(), Value::String(to_amount.to_string()));

        let route = Route {
            id: uuid::Uuid::new_v4().to_string(),
            steps: vec![RouteStep {
                transaction_request: Some(call),
                extra: step_extra,
            }],
            extra,
        };

        tracing::debug!(
            route_id = %route.id,
            from_amount = request.from_amount,
            to_amount,
            "Mock route quoted"
        );

        Ok(Some(SwapQuote {
            from_token: request.from_token,
            to_token: request.to_token,
            from_amount: request.from_amount,
            to_amount,
            route,
            price_impact: request.slippage_bps as f64 / 100.0,
            estimated_gas: "0".into(),
        }))
    }
}
