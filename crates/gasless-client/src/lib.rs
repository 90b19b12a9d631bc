//! # Gasless Swap Client
//!
//! Client side of the gasless swap protocol: a persistent connection to the
//! clearing node, the session-key auth handshake, two-party app sessions and
//! user-signed swap updates handed to the counterparty relay.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gasless_client::{ClientConfig, SwapClient};
//! use gasless_core::{LocalWallet, MockRouteProvider, QuoteRequest, RouteProvider, tokens};
//! use std::sync::Arc;
//!
//! let wallet = Arc::new(LocalWallet::from_private_key_hex(&key, 8453)?);
//! let client = SwapClient::connect(ClientConfig::default(), wallet).await?;
//!
//! client.authenticate().await?;
//! client.create_session(relay_address, "usdc").await?;
//!
//! let quote = MockRouteProvider::default()
//!     .get_route(&QuoteRequest::new(tokens::USDC.address, tokens::ETH.address, 5_000_000))
//!     .await?
//!     .expect("route");
//! let result = client.propose_swap(&quote).await?;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod correlator;
pub mod memory;
pub mod pipeline;
pub mod relay_client;
pub mod session;
pub mod state;
pub mod transport;

pub use auth::AuthHandshake;
pub use client::SwapClient;
pub use config::{AuthConfig, ClientConfig, TransportConfig};
pub use correlator::RequestCorrelator;
pub use memory::MemoryTransport;
pub use pipeline::{SignedUpdatePipeline, SwapRelay};
pub use relay_client::RelayHttpClient;
pub use session::{SessionManager, participant_order};
pub use state::{AuthContext, AuthPhase, ClientState, Session, SessionStatus};
pub use transport::{ConnectionStatus, Transport, TransportEvent, WsTransport};
