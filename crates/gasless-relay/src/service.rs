//! # Counterparty Relay Service
//!
//! Accepts a user-signed swap update, co-signs it, submits the fully signed
//! update to the clearing node and executes the route on-chain with the
//! backend key.
//!
//! ```text
//! validate fields ─▶ validate route ─▶ verify user signature ─▶ check deltas
//!        ─▶ replay guard ─▶ co-sign ─▶ submit update (fire-and-forget) ─▶ broadcast
//! ```
//!
//! Executions are serialized so the backend key never races itself for a
//! nonce.
//!
//! The user signature must cover everything the relay acts on: the intent
//! commits to the digest of the call being broadcast, and the allocation
//! deltas must debit the user exactly the route's source amount in favor of
//! this relay.

use crate::executor::SwapExecutor;
use crate::sink::StateSink;
use crate::types::ExecutionStats;
use crate::{RelayError, Result};
use alloy_primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use gasless_client::SwapRelay;
use gasless_core::api::{ExecuteSwapRequest, ExecuteSwapResponse};
use gasless_core::chain::PreparedCall;
use gasless_core::{
    RoleSignature, SessionId, SignerRole, StateUpdate, SwapIntent, WalletSigner, recover_address,
};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Request that passed validation
struct ValidatedSwap {
    session_id: SessionId,
    update: StateUpdate,
    call: PreparedCall,
}

/// Executed versions remembered per session
pub const DEFAULT_REPLAY_WINDOW: usize = 1024;

/// Versions already executed in one session
///
/// Holds at most `limit` versions. Evicted versions raise `floor`, and
/// anything at or below the floor counts as executed.
#[derive(Default)]
struct ReplayWindow {
    floor: u64,
    seen: BTreeSet<u64>,
}

impl ReplayWindow {
    /// Record `version`; false if it was already executed
    fn insert(&mut self, version: u64, limit: usize) -> bool {
        if version <= self.floor || !self.seen.insert(version) {
            return false;
        }
        while self.seen.len() > limit.max(1) {
            if let Some(lowest) = self.seen.pop_first() {
                self.floor = lowest;
            }
        }
        true
    }
}

/// Co-signs and executes user swap updates
pub struct RelayService {
    signer: Arc<dyn WalletSigner>,
    executor: SwapExecutor,
    sink: Arc<dyn StateSink>,
    executed: DashMap<SessionId, ReplayWindow>,
    replay_window: usize,
    execution_lock: Mutex<()>,
    stats: RwLock<ExecutionStats>,
}

impl RelayService {
    pub fn new(
        signer: Arc<dyn WalletSigner>,
        executor: SwapExecutor,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        Self {
            signer,
            executor,
            sink,
            executed: DashMap::new(),
            replay_window: DEFAULT_REPLAY_WINDOW,
            execution_lock: Mutex::new(()),
            stats: RwLock::new(ExecutionStats::default()),
        }
    }

    /// Remember at most `versions` executed versions per session
    pub fn with_replay_window(mut self, versions: usize) -> Self {
        self.replay_window = versions;
        self
    }

    /// Counterparty address updates must target
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats.read().clone()
    }

    /// Co-sign and execute a user-signed swap
    pub async fn execute_swap(&self, request: ExecuteSwapRequest) -> Result<ExecuteSwapResponse> {
        let swap = match self.validate(request) {
            Ok(swap) => swap,
            Err(e) => {
                self.stats.write().rejected += 1;
                warn!(code = e.code(), error = %e, "Swap rejected");
                return Err(e);
            }
        };
        let ValidatedSwap {
            session_id,
            mut update,
            call,
        } = swap;

        let fresh = self
            .executed
            .entry(session_id.clone())
            .or_default()
            .insert(update.version, self.replay_window);
        if !fresh {
            self.stats.write().rejected += 1;
            return Err(RelayError::AlreadyExecuted(format!(
                "session {} version {}",
                session_id, update.version
            )));
        }

        let _guard = self.execution_lock.lock().await;

        let signature = self
            .signer
            .sign_message(&update.signing_payload()?)
            .await
            .map_err(|e| RelayError::Internal(format!("co-sign failed: {}", e)))?;
        update.add_signature(RoleSignature {
            role: SignerRole::Counterparty,
            signer: self.address(),
            signature,
        })?;
        update.ensure_executable()?;

        if let Err(e) = self.sink.submit(&update) {
            warn!(session_id = %session_id, version = update.version, error = %e, "State update not submitted");
        }

        let tx = match self.executor.execute(&call).await {
            Ok(tx) => tx,
            Err(e) => {
                self.stats.write().failed += 1;
                return Err(e);
            }
        };

        self.stats.write().executed += 1;
        info!(
            session_id = %session_id,
            version = update.version,
            tx_hash = %tx.hash,
            "Swap executed"
        );
        Ok(ExecuteSwapResponse::executed(session_id, tx.hash))
    }

    fn validate(&self, request: ExecuteSwapRequest) -> Result<ValidatedSwap> {
        let ExecuteSwapRequest {
            session_id: Some(session_id),
            user_address: Some(user_address),
            signed_state_update: Some(update),
            proposed_route: Some(route),
        } = request
        else {
            return Err(RelayError::InvalidRequest(
                "Missing required fields: sessionId, userAddress, signedStateUpdate, proposedRoute"
                    .into(),
            ));
        };

        let call = self.executor.validate(&route)?;
        let amount = route.from_amount()?;

        let user: Address = user_address
            .parse()
            .map_err(|_| RelayError::InvalidRequest(format!("invalid userAddress {}", user_address)))?;
        if update.session_id != session_id {
            return Err(RelayError::InvalidRequest(
                "update belongs to a different session".into(),
            ));
        }
        if update.target != self.address() {
            return Err(RelayError::InvalidRequest(format!(
                "update targets {} instead of this relay",
                update.target
            )));
        }
        if update.signature_for(SignerRole::Counterparty).is_some() {
            return Err(RelayError::InvalidRequest(
                "update already carries a counterparty signature".into(),
            ));
        }
        if !update.allocations_balanced() {
            return Err(RelayError::InvalidRequest("allocation deltas do not balance".into()));
        }

        match update.intent_payload()? {
            SwapIntent::ExecuteSwap {
                route_id,
                session_id: intent_session,
                call_digest,
            } => {
                if intent_session != session_id {
                    return Err(RelayError::InvalidRequest(
                        "intent names a different session".into(),
                    ));
                }
                if route_id != route.id {
                    return Err(RelayError::InvalidRoute(
                        "route does not match the signed intent".into(),
                    ));
                }
                if call_digest != call.digest() {
                    return Err(RelayError::InvalidRoute(
                        "route call does not match the signed intent".into(),
                    ));
                }
            }
        }

        let user_sig = update
            .signature_for(SignerRole::User)
            .ok_or_else(|| RelayError::Unauthorized("missing user signature".into()))?;
        let recovered = recover_address(&update.signing_hash()?, &user_sig.signature)?;
        if recovered != user || user_sig.signer != user {
            return Err(RelayError::Unauthorized(
                "user signature does not match userAddress".into(),
            ));
        }
        check_allocations(&update, user, self.address(), amount)?;

        Ok(ValidatedSwap {
            session_id,
            update,
            call,
        })
    }
}

/// The user pays `amount` of one asset to `counterparty`, and nothing else moves
fn check_allocations(
    update: &StateUpdate,
    user: Address,
    counterparty: Address,
    amount: u128,
) -> Result<()> {
    let amount = i128::try_from(amount)
        .map_err(|_| RelayError::InvalidRoute("route fromAmount out of range".into()))?;

    let [first, second] = update.allocations.as_slice() else {
        return Err(RelayError::InvalidRequest(format!(
            "expected 2 allocation deltas, got {}",
            update.allocations.len()
        )));
    };
    let (debit, credit) = if first.participant == user && second.participant == counterparty {
        (first, second)
    } else if first.participant == counterparty && second.participant == user {
        (second, first)
    } else {
        return Err(RelayError::InvalidRequest(
            "allocation deltas must name the user and this relay".into(),
        ));
    };

    if debit.asset != credit.asset {
        return Err(RelayError::InvalidRequest("allocation deltas mix assets".into()));
    }
    if debit.delta != -amount || credit.delta != amount {
        return Err(RelayError::InvalidRequest(format!(
            "update must debit the user {} and credit this relay the same",
            amount
        )));
    }
    Ok(())
}

#[async_trait]
impl SwapRelay for RelayService {
    async fn execute_swap(
        &self,
        request: ExecuteSwapRequest,
    ) -> gasless_core::Result<ExecuteSwapResponse> {
        RelayService::execute_swap(self, request)
            .await
            .map_err(Into::into)
    }
}
