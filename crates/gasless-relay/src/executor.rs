//! On-chain execution of a route's first step

use crate::{RelayError, Result};
use gasless_core::chain::{Broadcaster, PreparedCall, TxHash};
use gasless_core::Route;
use alloy_primitives::Address;
use std::sync::Arc;
use tracing::{error, info};

/// Validates routes and broadcasts their first call
pub struct SwapExecutor {
    broadcaster: Arc<dyn Broadcaster>,
}

impl SwapExecutor {
    pub fn new(broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { broadcaster }
    }

    /// Address that pays for execution
    pub fn sender(&self) -> Address {
        self.broadcaster.sender()
    }

    /// Structural check: at least one step whose call has a target and data
    pub fn validate(&self, route: &Route) -> Result<PreparedCall> {
        Ok(route.first_call()?)
    }

    /// Broadcast `call`; failures are final for this attempt
    pub async fn execute(&self, call: &PreparedCall) -> Result<TxHash> {
        match self.broadcaster.send_transaction(call).await {
            Ok(tx) => {
                info!(to = %call.to, tx_hash = %tx.hash, "Route call broadcast");
                Ok(tx)
            }
            Err(e) => {
                error!(to = %call.to, error = %e, "Route call failed");
                Err(RelayError::Execution(e.to_string()))
            }
        }
    }
}
