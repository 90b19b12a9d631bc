//! # Signed Update Pipeline
//!
//! Turns a quote into a user-signed [`StateUpdate`] and hands it to the
//! counterparty relay, which co-signs and executes it. The pipeline never
//! broadcasts over the clearing-node transport itself.

use crate::state::{ClientState, Session};
use alloy_primitives::U256;
use async_trait::async_trait;
use gasless_core::api::{ExecuteSwapRequest, ExecuteSwapResponse};
use gasless_core::types::now_millis;
use gasless_core::{
    AllocationDelta, Error, IntentKind, Result, RoleSignature, SignerRole, StateUpdate, SwapIntent,
    SwapQuote, SwapResult, WalletSigner,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// The counterparty relay as seen by the pipeline
#[async_trait]
pub trait SwapRelay: Send + Sync {
    async fn execute_swap(&self, request: ExecuteSwapRequest) -> Result<ExecuteSwapResponse>;
}

/// Builds, signs and submits swap updates
pub struct SignedUpdatePipeline {
    relay: Arc<dyn SwapRelay>,
    last_version: AtomicU64,
}

impl SignedUpdatePipeline {
    pub fn new(relay: Arc<dyn SwapRelay>) -> Self {
        Self {
            relay,
            last_version: AtomicU64::new(0),
        }
    }

    /// Next update version: the current time in ms, bumped past the last one
    pub fn next_version(&self) -> u64 {
        let now = now_millis();
        let mut last = self.last_version.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self
                .last_version
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    /// Unsigned update swapping `quote` within `session`
    ///
    /// The intent commits to the route's first call, so a route without an
    /// executable first step cannot be proposed.
    pub fn build_update(&self, session: &Session, quote: &SwapQuote) -> Result<StateUpdate> {
        let call = quote.route.first_call()?;
        let data = serde_json::to_string(&SwapIntent::ExecuteSwap {
            route_id: quote.route.id.clone(),
            session_id: session.id.clone(),
            call_digest: call.digest(),
        })?;

        let amount = i128::try_from(quote.from_amount)
            .map_err(|_| Error::InvalidRequest("swap amount out of range".into()))?;

        Ok(StateUpdate {
            session_id: session.id.clone(),
            intent: IntentKind::ExecuteSwap,
            version: self.next_version(),
            data,
            target: session.counterparty,
            value: U256::ZERO,
            allocations: vec![
                AllocationDelta {
                    participant: session.user,
                    asset: session.asset.clone(),
                    delta: -amount,
                },
                AllocationDelta {
                    participant: session.counterparty,
                    asset: session.asset.clone(),
                    delta: amount,
                },
            ],
            signatures: Vec::new(),
        })
    }

    /// Sign a swap of `quote` as the user and have the relay execute it
    ///
    /// Every call is an independent attempt with its own version.
    pub async fn propose_swap(
        &self,
        state: &ClientState,
        signer: &dyn WalletSigner,
        quote: &SwapQuote,
    ) -> Result<SwapResult> {
        let session = state
            .session()
            .filter(|s| s.is_active())
            .ok_or(Error::NoActiveSession)?;

        let mut update = self.build_update(session, quote)?;
        let signature = signer.sign_message(&update.signing_payload()?).await?;
        update.add_signature(RoleSignature {
            role: SignerRole::User,
            signer: signer.address(),
            signature,
        })?;

        let version = update.version;
        info!(session_id = %session.id, version, route_id = %quote.route.id, "Proposing swap");

        let request = ExecuteSwapRequest::new(
            session.id.clone(),
            session.user.to_checksum(None),
            update,
            quote.route.clone(),
        );
        let response = self.relay.execute_swap(request).await?;

        match (response.success, response.transaction_hash) {
            (true, Some(tx_hash)) => {
                info!(session_id = %session.id, version, tx_hash = %tx_hash, "Swap executed");
                Ok(SwapResult::success(tx_hash))
            }
            (true, None) => Ok(SwapResult::failure("relay reported success without a transaction hash")),
            (false, _) => {
                let reason = response.error.unwrap_or_else(|| "swap failed".to_string());
                warn!(session_id = %session.id, version, error = %reason, "Relay rejected swap");
                Ok(SwapResult::failure(reason))
            }
        }
    }
}
