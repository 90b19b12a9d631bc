//! Error types for gasless swap operations

use thiserror::Error;

/// Result type alias for gasless swap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur anywhere in the swap flow
///
/// Every variant maps to a short machine-stable code via [`Error::code`], so
/// callers crossing a component boundary never see an opaque failure.
#[derive(Debug, Error)]
pub enum Error {
    // ============ Transport Errors ============
    /// Transport could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// Send attempted while the transport is not connected
    #[error("Not connected")]
    NotConnected,

    /// No matching response within the time budget
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// The relay reported an error message
    #[error("Server error: {0}")]
    Server(String),

    /// A request for the same response tag is already outstanding
    #[error("Duplicate request: a `{0}` response is already awaited")]
    DuplicateRequest(String),

    // ============ Protocol Errors ============
    /// Challenge-response handshake failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Operation requires an authenticated connection
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Operation requires an active session
    #[error("No active session. Create a session first")]
    NoActiveSession,

    // ============ Input Errors ============
    /// Proposed route is structurally invalid
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// Request is missing fields or malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ============ Execution Errors ============
    /// On-chain execution or relay round trip failed
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Wallet or key signing failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Chain RPC failure
    #[error("Chain error: {0}")]
    Chain(String),

    // ============ Internal Errors ============
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Machine-stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection_error",
            Error::NotConnected => "not_connected",
            Error::Timeout(_) => "timeout",
            Error::Server(_) => "server_error",
            Error::DuplicateRequest(_) => "duplicate_request",
            Error::Authentication(_) => "authentication_error",
            Error::NotAuthenticated => "not_authenticated",
            Error::NoActiveSession => "no_active_session",
            Error::InvalidRoute(_) => "invalid_route",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Execution(_) => "execution_error",
            Error::Signing(_) => "signing_error",
            Error::Chain(_) => "chain_error",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Serialization(_) => "serialization_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether re-issuing the same logical request may succeed
    ///
    /// Execution failures are deliberately excluded: the caller must fetch a
    /// fresh quote and propose again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::NotConnected | Error::Timeout(_) | Error::Chain(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Serialization(e.to_string())
    }
}
