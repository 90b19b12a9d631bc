//! # Client State
//!
//! One owned [`ClientState`] holds the auth phase and the active session.
//! Components receive it by reference; every lifecycle change goes through a
//! named transition so each one can be tested in isolation.
//!
//! ```text
//! Idle ─▶ RequestSent ─▶ ChallengeReceived ─▶ VerifySent ─▶ Authenticated
//!   ▲                                                            │
//!   └──────────── failure / disconnect / epoch change ───────────┘
//! ```

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use gasless_core::rpc::AppDefinition;
use gasless_core::{Error, Result, SessionId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Context established by a successful handshake
///
/// Valid only for the connection epoch it was created in.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Authenticated wallet
    pub participant: Address,
    /// Public address of the ephemeral session key
    pub session_key: Address,
    /// Unix seconds
    pub expires_at: u64,
    /// Connection epoch the handshake ran on
    pub epoch: u64,
    pub jwt: Option<String>,
}

impl AuthContext {
    pub fn is_expired(&self, now_secs: u64) -> bool {
        now_secs >= self.expires_at
    }

    pub fn is_valid_for(&self, epoch: u64, now_secs: u64) -> bool {
        self.epoch == epoch && !self.is_expired(now_secs)
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("participant", &self.participant)
            .field("session_key", &self.session_key)
            .field("expires_at", &self.expires_at)
            .field("epoch", &self.epoch)
            .field("jwt", &self.jwt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Handshake phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthPhase {
    #[default]
    Idle,
    RequestSent,
    ChallengeReceived,
    VerifySent,
    Authenticated(AuthContext),
}

impl AuthPhase {
    pub fn name(&self) -> &'static str {
        match self {
            AuthPhase::Idle => "idle",
            AuthPhase::RequestSent => "request_sent",
            AuthPhase::ChallengeReceived => "challenge_received",
            AuthPhase::VerifySent => "verify_sent",
            AuthPhase::Authenticated(_) => "authenticated",
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    Closed,
}

/// Negotiated two-party session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub definition: AppDefinition,
    /// participant -> asset -> amount
    pub allocations: BTreeMap<Address, BTreeMap<String, u128>>,
    pub user: Address,
    pub counterparty: Address,
    /// Asset the session is denominated in
    pub asset: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Participants in canonical order
    pub fn participants(&self) -> &[Address] {
        &self.definition.participants
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Auth phase plus the active session
///
/// A session is stored only while active, so `session_id().is_some()` and
/// `session_active()` always agree.
#[derive(Debug, Default)]
pub struct ClientState {
    auth: AuthPhase,
    session: Option<Session>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth_phase(&self) -> &AuthPhase {
        &self.auth
    }

    pub fn auth_context(&self) -> Option<&AuthContext> {
        match &self.auth {
            AuthPhase::Authenticated(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_context().is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|s| &s.id)
    }

    pub fn session_active(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    /// Move the handshake to `next`
    pub(crate) fn transition(&mut self, next: AuthPhase) {
        debug!(from = self.auth.name(), to = next.name(), "Auth transition");
        if !matches!(next, AuthPhase::Authenticated(_)) {
            // Sessions hang off an authenticated context
            self.session = None;
        }
        self.auth = next;
    }

    /// Store a newly negotiated session; only active sessions are kept
    pub(crate) fn set_session(&mut self, session: Session) {
        if session.is_active() {
            self.session = Some(session);
        } else {
            self.session = None;
        }
    }

    /// Local teardown of the session; returns the closed session
    pub fn close_session(&mut self) -> Option<Session> {
        self.session.take().map(|mut session| {
            session.status = SessionStatus::Closed;
            info!(session_id = %session.id, "Session closed");
            session
        })
    }

    /// Connection `epoch` closed: drop everything derived from it
    pub fn on_disconnect(&mut self, epoch: u64) {
        let stale = match &self.auth {
            AuthPhase::Authenticated(ctx) => ctx.epoch <= epoch,
            AuthPhase::Idle => false,
            _ => true,
        };
        if stale || self.session.is_some() {
            info!(epoch, "Connection lost, clearing auth and session");
            self.transition(AuthPhase::Idle);
        }
    }

    /// Drop auth that belongs to an older connection
    pub fn observe_epoch(&mut self, current: u64) {
        if let AuthPhase::Authenticated(ctx) = &self.auth
            && ctx.epoch != current
        {
            debug!(auth_epoch = ctx.epoch, current, "Auth context is stale");
            self.transition(AuthPhase::Idle);
        }
    }

    /// Auth context valid for `epoch` at `now_secs`, or `NotAuthenticated`
    pub fn require_auth(&mut self, epoch: u64, now_secs: u64) -> Result<AuthContext> {
        self.observe_epoch(epoch);
        match &self.auth {
            AuthPhase::Authenticated(ctx) if ctx.is_valid_for(epoch, now_secs) => Ok(ctx.clone()),
            AuthPhase::Authenticated(_) => {
                self.transition(AuthPhase::Idle);
                Err(Error::NotAuthenticated)
            }
            _ => Err(Error::NotAuthenticated),
        }
    }
}

/// Current Unix time in seconds
pub(crate) fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
