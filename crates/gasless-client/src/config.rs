//! Client configuration

use alloy_primitives::{Address, U256};
use gasless_core::eip712::Allowance;
use gasless_core::{ChainId, DEFAULT_REQUEST_TIMEOUT_MS, SESSION_PROTOCOL};
use std::time::Duration;

/// Default clearing node endpoint
pub const DEFAULT_CLEARNODE_URL: &str = "wss://clearnet.yellow.com/ws";

/// Default relay endpoint
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3001";

/// Transport channel configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// WebSocket URL of the clearing node
    pub url: String,
    /// Budget for opening the socket
    pub connect_timeout: Duration,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,
    /// Ping interval while connected
    pub keepalive_interval: Duration,
    /// Reconnect after an unexpected close
    pub auto_reconnect: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CLEARNODE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            keepalive_interval: Duration::from_secs(30),
            auto_reconnect: true,
        }
    }
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn without_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }
}

/// Auth handshake configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Application the session key is scoped to
    pub application: Address,
    /// Application name, also the EIP-712 domain name
    pub app_name: String,
    pub scope: String,
    /// Chain the typed data is bound to
    pub auth_chain_id: u64,
    /// Chain to return to after verification
    pub operating_chain_id: Option<u64>,
    pub session_ttl: Duration,
    pub domain_version: String,
    /// Spending allowances requested for the session key
    pub allowances: Vec<Allowance>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            application: Address::ZERO,
            app_name: "gasless-swap".to_string(),
            scope: "user".to_string(),
            auth_chain_id: ChainId::BASE.0,
            operating_chain_id: None,
            session_ttl: Duration::from_secs(3600),
            domain_version: "1".to_string(),
            allowances: Vec::new(),
        }
    }
}

impl AuthConfig {
    pub fn with_application(mut self, application: Address) -> Self {
        self.application = application;
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_auth_chain(mut self, chain_id: u64) -> Self {
        self.auth_chain_id = chain_id;
        self
    }

    pub fn with_operating_chain(mut self, chain_id: u64) -> Self {
        self.operating_chain_id = Some(chain_id);
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_allowance(mut self, asset: impl Into<String>, amount: U256) -> Self {
        self.allowances.push(Allowance {
            asset: asset.into(),
            amount,
        });
        self
    }
}

/// Top-level client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    pub auth: AuthConfig,
    /// Budget for each correlated request
    pub request_timeout: Duration,
    /// Base URL of the counterparty relay
    pub relay_url: String,
    /// Protocol tag for app sessions
    pub protocol: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            auth: AuthConfig::default(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            relay_url: DEFAULT_RELAY_URL.to_string(),
            protocol: SESSION_PROTOCOL.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }
}
