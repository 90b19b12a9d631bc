//! # Gasless Relay Service
//!
//! Counterparty backend for gasless swaps. A user who holds stablecoins but
//! no native gas signs a swap update; the relay co-signs it, submits it to
//! the clearing node and pays for the on-chain execution itself.
//!
//! ## Execution Flow
//!
//! ```text
//! User Client ──POST /execute-swap──► Relay
//!                                       │ validate route + user signature
//!                                       │ co-sign as counterparty
//!                                       ├──► Clearing node (state_update)
//!                                       └──► Chain (route call, backend gas)
//!      ◄──────────── transactionHash ───┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gasless_relay::{ClearnodeSink, RelayConfig, RelayServer, RelayService, SwapExecutor};
//!
//! let service = RelayService::new(
//!     backend_wallet,
//!     SwapExecutor::new(broadcaster),
//!     Arc::new(ClearnodeSink::new(clearnode_transport)),
//! );
//!
//! RelayServer::new(Arc::new(service), RelayConfig::default())
//!     .serve("0.0.0.0:3001".parse::<std::net::SocketAddr>()?)
//!     .await?;
//! ```

pub mod error;
pub mod executor;
pub mod service;
pub mod sink;
pub mod types;

#[cfg(feature = "server")]
pub mod server;

pub use error::{RelayError, Result};
pub use executor::SwapExecutor;
pub use service::RelayService;
pub use sink::{ClearnodeSink, StateSink};
pub use types::{ExecutionStats, HealthResponse};

#[cfg(feature = "server")]
pub use server::{ApiError, AppState, RelayConfig, RelayServer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
