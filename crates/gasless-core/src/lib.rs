//! # Gasless Core
//!
//! Core library for gasless stablecoin swaps: a wallet holder with no native
//! gas authorizes a relay to execute a swap on their behalf.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **State updates**: versioned swap intents that must carry both a `user`
//!   and a `counterparty` signature before execution
//! - **Signing**: the [`WalletSigner`] seam, EIP-191 personal sign and the
//!   EIP-712 auth policy
//! - **Wire envelope**: clearing node request/response arrays
//! - **Routes**: the [`RouteProvider`] seam and a fixed-price mock
//! - **Chain**: the [`Broadcaster`](chain::Broadcaster) seam and an EIP-1559
//!   broadcaster with RPC failover
//!
//! ```text
//!  user wallet ──signs──▶ StateUpdate{user} ──HTTP──▶ relay
//!                                                    │ co-signs
//!                                                    ▼
//!                        StateUpdate{user, counterparty}
//!                              │                │
//!                     clearing node      route.first_call()
//!                     (state_update)       ──▶ Broadcaster
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gasless_core::route::{MockRouteProvider, QuoteRequest, RouteProvider};
//! use gasless_core::tokens::{USDC, WETH};
//!
//! let provider = MockRouteProvider::default();
//! let quote = provider
//!     .get_route(&QuoteRequest::new(USDC.address, WETH.address, 5_000_000))
//!     .await?
//!     .expect("USDC -> WETH is relayed");
//! let call = quote.route.first_call()?;
//! ```

pub mod api;
pub mod chain;
pub mod eip712;
pub mod error;
pub mod route;
pub mod rpc;
pub mod signer;
pub mod tokens;
pub mod types;

pub use error::{Error, Result};
pub use route::{MockRouteProvider, QuoteRequest, Route, RouteProvider};
pub use signer::{LocalWallet, SessionKey, WalletSigner, recover_address};
pub use types::{
    AllocationDelta, IntentKind, RoleSignature, SessionId, Signature, SignerRole, StateUpdate,
    SwapIntent, SwapQuote, SwapResult, keccak256_hash,
};

pub use chain::{Broadcaster, ChainId, PreparedCall, TxHash};

#[cfg(feature = "runtime")]
pub use chain::{EvmBroadcaster, EvmConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol tag for app sessions
pub const SESSION_PROTOCOL: &str = "NitroRPC/0.2";

/// Default request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
