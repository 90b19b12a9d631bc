//! Submission of fully signed updates to the session's record of truth

use crate::{RelayError, Result};
use gasless_client::{Transport, TransportConfig, WsTransport};
use gasless_core::StateUpdate;
use gasless_core::rpc::state_update_message;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Destination for co-signed state updates
///
/// Submission is fire-and-forget: a successful return means the update was
/// queued, not acknowledged.
pub trait StateSink: Send + Sync {
    fn submit(&self, update: &StateUpdate) -> Result<()>;
}

/// Sends updates to the clearing node as `state_update` notifications
pub struct ClearnodeSink {
    transport: Arc<dyn Transport>,
}

impl ClearnodeSink {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sink over a WebSocket connection to the clearing node
    ///
    /// An unreachable node is not fatal: the transport keeps retrying in the
    /// background and submissions fail until it connects.
    pub async fn connect(config: TransportConfig) -> Self {
        let url = config.url.clone();
        let transport = Arc::new(WsTransport::new(config));
        match transport.connect().await {
            Ok(()) => info!(url = %url, "State updates go to the clearing node"),
            Err(e) => {
                warn!(url = %url, error = %e, "Clearing node unreachable, retrying in background");
                transport.spawn_connect();
            }
        }
        Self::new(transport)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }
}

impl StateSink for ClearnodeSink {
    fn submit(&self, update: &StateUpdate) -> Result<()> {
        let message = state_update_message(update)?;
        self.transport
            .send(message)
            .map_err(|e| RelayError::Network(e.to_string()))?;
        debug!(session_id = %update.session_id, version = update.version, "State update submitted");
        Ok(())
    }
}
