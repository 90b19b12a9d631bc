//! Error types for the relay service

use thiserror::Error;

/// Relay service errors
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or inconsistent request fields
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Route is structurally unusable
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// User signature missing or from the wrong signer
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// This `(session, version)` was already executed
    #[error("Already executed: {0}")]
    AlreadyExecuted(String),

    /// Broadcast failed after co-signing
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Clearing node or RPC unreachable
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::InvalidRequest(_) => 400,
            RelayError::InvalidRoute(_) => 400,
            RelayError::Serialization(_) => 400,
            RelayError::Unauthorized(_) => 401,
            RelayError::AlreadyExecuted(_) => 409,
            RelayError::Execution(_) => 502,
            RelayError::Network(_) => 503,
            RelayError::Internal(_) => 500,
        }
    }

    /// Machine-stable error code
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidRequest(_) => "invalid_request",
            RelayError::InvalidRoute(_) => "invalid_route",
            RelayError::Unauthorized(_) => "unauthorized",
            RelayError::AlreadyExecuted(_) => "already_executed",
            RelayError::Execution(_) => "execution_error",
            RelayError::Network(_) => "network_error",
            RelayError::Serialization(_) => "serialization_error",
            RelayError::Internal(_) => "internal_error",
        }
    }

    /// Check if this error is retryable
    ///
    /// A failed execution is not: the caller re-quotes and re-proposes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Network(_))
    }
}

impl From<gasless_core::Error> for RelayError {
    fn from(err: gasless_core::Error) -> Self {
        use gasless_core::Error as E;
        match err {
            E::InvalidRoute(msg) => RelayError::InvalidRoute(msg),
            E::InvalidRequest(msg) => RelayError::InvalidRequest(msg),
            E::Signing(msg) => RelayError::Unauthorized(msg),
            E::Execution(msg) | E::Chain(msg) => RelayError::Execution(msg),
            E::Serialization(msg) => RelayError::Serialization(msg),
            E::Connection(msg) | E::Timeout(msg) => RelayError::Network(msg),
            E::NotConnected => RelayError::Network("not connected".into()),
            other => RelayError::Internal(other.to_string()),
        }
    }
}

impl From<RelayError> for gasless_core::Error {
    fn from(err: RelayError) -> Self {
        use gasless_core::Error as E;
        match err {
            RelayError::InvalidRequest(msg) | RelayError::AlreadyExecuted(msg) => {
                E::InvalidRequest(msg)
            }
            RelayError::InvalidRoute(msg) => E::InvalidRoute(msg),
            RelayError::Unauthorized(msg) => E::Signing(msg),
            RelayError::Execution(msg) => E::Execution(msg),
            RelayError::Network(msg) => E::Connection(msg),
            RelayError::Serialization(msg) => E::Serialization(msg),
            RelayError::Internal(msg) => E::Internal(msg),
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;
