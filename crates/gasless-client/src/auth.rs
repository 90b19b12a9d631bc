//! # Auth Handshake
//!
//! Three-message challenge/response that binds an ephemeral session key to
//! the user's wallet:
//!
//! 1. `auth_request`: wallet, session key, scope and allowances, signed by
//!    the session key to prove possession
//! 2. `auth_challenge`: challenge string from the clearing node
//! 3. `auth_verify`: EIP-712 signature over the auth policy by the wallet
//!
//! The session key secret never leaves this module and is dropped when the
//! attempt ends, successful or not.

use crate::config::AuthConfig;
use crate::correlator::RequestCorrelator;
use crate::state::{AuthContext, AuthPhase, ClientState, now_secs};
use gasless_core::eip712::{AuthPolicy, AuthTypedData, Eip712Domain};
use gasless_core::rpc::{
    AuthChallenge, AuthRequestParams, AuthVerifyParams, AuthVerifyResult, RpcRequest, methods,
};
use gasless_core::types::keccak256_hash;
use gasless_core::{Error, Result, SessionKey, WalletSigner};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs the auth handshake against a clearing node
#[derive(Debug, Clone)]
pub struct AuthHandshake {
    config: AuthConfig,
    request_timeout: Duration,
}

impl AuthHandshake {
    pub fn new(config: AuthConfig, request_timeout: Duration) -> Self {
        Self {
            config,
            request_timeout,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate `signer` on connection `epoch`
    ///
    /// On any failure the state returns to [`AuthPhase::Idle`]. A timeout is
    /// reported as [`Error::Timeout`] so callers can retry; other failures
    /// surface as [`Error::Authentication`].
    pub async fn authenticate(
        &self,
        state: &mut ClientState,
        correlator: &RequestCorrelator,
        signer: &dyn WalletSigner,
        epoch: u64,
    ) -> Result<AuthContext> {
        match self.run(state, correlator, signer, epoch).await {
            Ok(ctx) => {
                state.transition(AuthPhase::Authenticated(ctx.clone()));
                info!(
                    participant = %ctx.participant,
                    session_key = %ctx.session_key,
                    epoch,
                    "Authenticated"
                );
                self.restore_operating_chain(signer).await;
                Ok(ctx)
            }
            Err(e) => {
                warn!(phase = state.auth_phase().name(), error = %e, "Auth handshake failed");
                state.transition(AuthPhase::Idle);
                Err(classify(e))
            }
        }
    }

    async fn run(
        &self,
        state: &mut ClientState,
        correlator: &RequestCorrelator,
        signer: &dyn WalletSigner,
        epoch: u64,
    ) -> Result<AuthContext> {
        let participant = signer.address();
        let session_key = SessionKey::generate();
        let expires_at = now_secs() + self.config.session_ttl.as_secs();

        // Step 1: auth_request, signed by the session key
        let params = AuthRequestParams {
            address: participant,
            session_key: session_key.address(),
            app_name: self.config.app_name.clone(),
            allowances: self.config.allowances.clone(),
            expire: expires_at.to_string(),
            scope: self.config.scope.clone(),
            application: self.config.application,
        };
        let request = RpcRequest::new(
            correlator.next_request_id(),
            methods::AUTH_REQUEST,
            json!([params]),
        );
        let proof = session_key.sign_hash(&keccak256_hash(&request.payload_bytes()?))?;

        state.transition(AuthPhase::RequestSent);
        let response = correlator
            .send_and_await(
                request.id,
                methods::AUTH_CHALLENGE,
                request.to_envelope(&[proof]),
                self.request_timeout,
            )
            .await?;
        let challenge: AuthChallenge = response.decode()?;
        if challenge.challenge_message.is_empty() {
            return Err(Error::Authentication("empty challenge".into()));
        }
        state.transition(AuthPhase::ChallengeReceived);
        debug!("Challenge received");

        // Step 2: wallet signs the policy on the auth chain
        let typed_data = AuthTypedData {
            domain: Eip712Domain::new(
                self.config.app_name.clone(),
                self.config.domain_version.clone(),
                self.config.auth_chain_id,
            ),
            message: AuthPolicy {
                challenge: challenge.challenge_message.clone(),
                scope: self.config.scope.clone(),
                wallet: participant,
                application: self.config.application,
                participant: session_key.address(),
                expire: expires_at,
                allowances: self.config.allowances.clone(),
            },
        };
        self.ensure_chain(signer, self.config.auth_chain_id).await?;
        let signature = signer.sign_typed_data(&typed_data).await?;

        // Step 3: auth_verify
        let params = AuthVerifyParams {
            challenge: challenge.challenge_message,
        };
        let request = RpcRequest::new(
            correlator.next_request_id(),
            methods::AUTH_VERIFY,
            json!([params]),
        );
        state.transition(AuthPhase::VerifySent);
        let response = correlator
            .send_and_await(
                request.id,
                methods::AUTH_VERIFY,
                request.to_envelope(&[signature]),
                self.request_timeout,
            )
            .await?;
        let verified: AuthVerifyResult = response.decode()?;

        if !verified.success {
            return Err(Error::Authentication("verification rejected".into()));
        }
        if verified.address != participant {
            return Err(Error::Authentication(format!(
                "verified address {} does not match wallet {}",
                verified.address, participant
            )));
        }
        if verified.session_key != session_key.address() {
            return Err(Error::Authentication("verified session key mismatch".into()));
        }

        Ok(AuthContext {
            participant,
            session_key: session_key.address(),
            expires_at,
            epoch,
            jwt: verified.jwt_token,
        })
    }

    /// Switch the wallet to `chain_id` and confirm the switch took effect
    async fn ensure_chain(&self, signer: &dyn WalletSigner, chain_id: u64) -> Result<()> {
        let current = signer.chain_id().await?;
        if current == chain_id {
            return Ok(());
        }

        debug!(from = current, to = chain_id, "Switching wallet chain");
        signer.switch_chain(chain_id).await?;
        let confirmed = signer.chain_id().await?;
        if confirmed != chain_id {
            return Err(Error::Signing(format!(
                "wallet stayed on chain {} after switching to {}",
                confirmed, chain_id
            )));
        }
        Ok(())
    }

    /// Return to the operating chain; failure here does not undo the auth
    async fn restore_operating_chain(&self, signer: &dyn WalletSigner) {
        let Some(chain_id) = self.config.operating_chain_id else {
            return;
        };
        if chain_id == self.config.auth_chain_id {
            return;
        }
        if let Err(e) = self.ensure_chain(signer, chain_id).await {
            warn!(chain_id, error = %e, "Could not switch back to operating chain");
        }
    }
}

fn classify(error: Error) -> Error {
    match error {
        Error::Timeout(_)
        | Error::Connection(_)
        | Error::NotConnected
        | Error::DuplicateRequest(_)
        | Error::Authentication(_) => error,
        other => Error::Authentication(other.to_string()),
    }
}
