//! Shared relay fixtures

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use gasless_client::memory::Responder;
use gasless_client::{Session, SessionStatus, SignedUpdatePipeline, SwapRelay, participant_order};
use gasless_core::api::ExecuteSwapRequest;
use gasless_core::chain::{Broadcaster, PreparedCall, TxHash};
use gasless_core::rpc::{AppDefinition, AuthRequestParams, RpcRequest, RpcResponse, methods};
use gasless_core::tokens::{ETH, USDC};
use gasless_core::{
    LocalWallet, MockRouteProvider, QuoteRequest, RoleSignature, RouteProvider, SignerRole,
    StateUpdate, SwapQuote, WalletSigner,
};
use gasless_relay::{RelayService, StateSink, SwapExecutor};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// Chain & Sink Doubles
// ============================================================================

/// Broadcaster that records calls and tracks overlapping sends
pub struct MockBroadcaster {
    sender: Address,
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockBroadcaster {
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            delay: Duration::ZERO,
            fail: false,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broadcaster for MockBroadcaster {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn send_transaction(&self, _call: &PreparedCall) -> gasless_core::Result<TxHash> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(gasless_core::Error::Chain("replacement transaction underpriced".into()));
        }
        Ok(TxHash::new(format!("0x{:064x}", n)))
    }
}

/// Sink that keeps every submitted update
#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<StateUpdate>>,
}

impl StateSink for RecordingSink {
    fn submit(&self, update: &StateUpdate) -> gasless_relay::Result<()> {
        self.updates.lock().push(update.clone());
        Ok(())
    }
}

// ============================================================================
// Backend Fixture
// ============================================================================

pub struct Backend {
    pub wallet: Arc<LocalWallet>,
    pub broadcaster: Arc<MockBroadcaster>,
    pub sink: Arc<RecordingSink>,
    pub service: Arc<RelayService>,
}

impl Backend {
    pub fn new() -> Self {
        Self::with_broadcaster(|b| b)
    }

    pub fn with_broadcaster(configure: impl FnOnce(MockBroadcaster) -> MockBroadcaster) -> Self {
        let wallet = Arc::new(LocalWallet::random(8453));
        let broadcaster = Arc::new(configure(MockBroadcaster::new(wallet.address())));
        let sink = Arc::new(RecordingSink::default());
        let service = Arc::new(RelayService::new(
            wallet.clone(),
            SwapExecutor::new(broadcaster.clone()),
            sink.clone(),
        ));
        Self {
            wallet,
            broadcaster,
            sink,
            service,
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

// ============================================================================
// User Side
// ============================================================================

pub async fn quote(from_amount: u128) -> SwapQuote {
    MockRouteProvider::default()
        .get_route(&QuoteRequest::new(USDC.address, ETH.address, from_amount))
        .await
        .unwrap()
        .unwrap()
}

pub fn session(user: Address, counterparty: Address) -> Session {
    Session {
        id: "0xsession".into(),
        definition: AppDefinition {
            protocol: "NitroRPC/0.2".into(),
            participants: participant_order(user, counterparty).to_vec(),
            weights: vec![1, 1],
            quorum: 2,
            challenge: 0,
            nonce: 0,
        },
        allocations: BTreeMap::new(),
        user,
        counterparty,
        asset: "usdc".into(),
        status: SessionStatus::Active,
        created_at: Utc::now(),
    }
}

/// Relay that is never called; only update construction is used
struct Unreachable;

#[async_trait]
impl SwapRelay for Unreachable {
    async fn execute_swap(
        &self,
        _request: ExecuteSwapRequest,
    ) -> gasless_core::Result<gasless_core::api::ExecuteSwapResponse> {
        Err(gasless_core::Error::Internal("unreachable relay".into()))
    }
}

/// User-signed request exactly as the client pipeline would send it
pub async fn signed_request(
    user: &LocalWallet,
    relay: Address,
    quote: &SwapQuote,
    version: Option<u64>,
) -> ExecuteSwapRequest {
    let session = session(user.address(), relay);
    let pipeline = SignedUpdatePipeline::new(Arc::new(Unreachable));
    let mut update = pipeline.build_update(&session, quote).unwrap();
    if let Some(version) = version {
        update.version = version;
    }
    let signature = user.sign_message(&update.signing_payload().unwrap()).await.unwrap();
    update
        .add_signature(RoleSignature {
            role: SignerRole::User,
            signer: user.address(),
            signature,
        })
        .unwrap();
    ExecuteSwapRequest::new(
        session.id.clone(),
        user.address().to_checksum(None),
        update,
        quote.route.clone(),
    )
}

// ============================================================================
// Clearing Node
// ============================================================================

/// Node that accepts any handshake and opens every session
pub fn accepting_node() -> Responder {
    let mut pending: Option<AuthRequestParams> = None;
    let mut opened = 0u64;
    Box::new(move |text| {
        let Ok((request, _)) = RpcRequest::parse(text) else {
            return Vec::new();
        };
        let reply = match request.method.as_str() {
            methods::AUTH_REQUEST => {
                pending = serde_json::from_value(request.params[0].clone()).ok();
                RpcResponse::new(
                    request.id,
                    methods::AUTH_CHALLENGE,
                    json!([{"challenge_message": "relay-test"}]),
                )
            }
            methods::AUTH_VERIFY => match pending.take() {
                Some(params) => RpcResponse::new(
                    request.id,
                    methods::AUTH_VERIFY,
                    json!([{
                        "address": params.address,
                        "session_key": params.session_key,
                        "success": true,
                    }]),
                ),
                None => RpcResponse::error(request.id, "no pending challenge"),
            },
            methods::CREATE_APP_SESSION => {
                opened += 1;
                RpcResponse::new(
                    request.id,
                    methods::CREATE_APP_SESSION,
                    json!([{"app_session_id": format!("0x{:064x}", opened), "status": "open"}]),
                )
            }
            other => RpcResponse::error(request.id, format!("unknown method {other}")),
        };
        vec![reply.to_envelope()]
    })
}
