//! Two-party app session negotiation

use crate::correlator::RequestCorrelator;
use crate::state::{ClientState, Session, SessionStatus, now_secs};
use alloy_primitives::Address;
use chrono::Utc;
use gasless_core::rpc::{
    AppAllocation, AppDefinition, CreateAppSessionParams, CreateAppSessionResult, RpcRequest,
    methods,
};
use gasless_core::types::{keccak256_hash, now_millis};
use gasless_core::{Error, Result, SessionId, WalletSigner};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// Participants in canonical (ascending address) order
///
/// Both sides derive the same definition regardless of who proposes it.
pub fn participant_order(a: Address, b: Address) -> [Address; 2] {
    if a <= b { [a, b] } else { [b, a] }
}

/// Negotiates sessions with the clearing node
#[derive(Debug, Clone)]
pub struct SessionManager {
    protocol: String,
    request_timeout: Duration,
}

impl SessionManager {
    pub fn new(protocol: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            protocol: protocol.into(),
            request_timeout,
        }
    }

    /// Session definition for `user` and `counterparty`
    pub fn definition(&self, user: Address, counterparty: Address, nonce: u64) -> AppDefinition {
        AppDefinition {
            protocol: self.protocol.clone(),
            participants: participant_order(user, counterparty).to_vec(),
            weights: vec![1, 1],
            quorum: 2,
            challenge: 0,
            nonce,
        }
    }

    /// Open a session between the authenticated user and `counterparty`
    ///
    /// Any existing session is closed first. Requires a valid auth context
    /// for the current connection `epoch`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_session(
        &self,
        state: &mut ClientState,
        correlator: &RequestCorrelator,
        signer: &dyn WalletSigner,
        epoch: u64,
        user: Address,
        counterparty: Address,
        asset: &str,
    ) -> Result<SessionId> {
        let ctx = state.require_auth(epoch, now_secs())?;
        if user != ctx.participant {
            return Err(Error::InvalidRequest(format!(
                "session user {} is not the authenticated wallet {}",
                user, ctx.participant
            )));
        }
        if user == counterparty {
            return Err(Error::InvalidRequest(
                "counterparty must differ from the user".into(),
            ));
        }
        if let Some(previous) = state.close_session() {
            info!(session_id = %previous.id, "Replacing existing session");
        }

        let definition = self.definition(user, counterparty, now_millis());
        let allocations: Vec<AppAllocation> = definition
            .participants
            .iter()
            .map(|participant| AppAllocation {
                participant: *participant,
                asset: asset.to_string(),
                amount: "0".to_string(),
            })
            .collect();
        let params = CreateAppSessionParams {
            definition: definition.clone(),
            allocations: allocations.clone(),
        };

        let request = RpcRequest::new(
            correlator.next_request_id(),
            methods::CREATE_APP_SESSION,
            json!([params]),
        );
        let signature = signer.sign_message(&request.payload_bytes()?).await?;
        let response = correlator
            .send_and_await(
                request.id,
                methods::CREATE_APP_SESSION,
                request.to_envelope(&[signature]),
                self.request_timeout,
            )
            .await?;
        let result: CreateAppSessionResult = response.decode()?;

        // The operation may have spanned a reconnect
        state.require_auth(correlator.transport().epoch(), now_secs())?;

        let id = match result.app_session_id {
            Some(id) if !id.is_empty() => id,
            _ => local_session_id(&definition)?,
        };

        let mut balances: BTreeMap<Address, BTreeMap<String, u128>> = BTreeMap::new();
        for allocation in &allocations {
            let amount = allocation
                .amount
                .parse::<u128>()
                .map_err(|e| Error::Internal(format!("bad allocation amount: {}", e)))?;
            balances
                .entry(allocation.participant)
                .or_default()
                .insert(allocation.asset.clone(), amount);
        }

        state.set_session(Session {
            id: id.clone(),
            definition,
            allocations: balances,
            user,
            counterparty,
            asset: asset.to_string(),
            status: SessionStatus::Active,
            created_at: Utc::now(),
        });
        info!(session_id = %id, counterparty = %counterparty, asset, "Session created");
        Ok(id)
    }
}

/// Deterministic id for a session the node did not name
fn local_session_id(definition: &AppDefinition) -> Result<SessionId> {
    let bytes = serde_json::to_vec(definition)?;
    Ok(format!("0x{}", hex::encode(keccak256_hash(&bytes))))
}
