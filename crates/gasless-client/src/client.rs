//! # Swap Client
//!
//! Facade over the transport, correlator, handshake, session manager and
//! update pipeline. All lifecycle state lives in one [`ClientState`] behind an
//! async mutex, so operations on a client are serialized.

use crate::auth::AuthHandshake;
use crate::config::ClientConfig;
use crate::correlator::RequestCorrelator;
use crate::pipeline::{SignedUpdatePipeline, SwapRelay};
use crate::relay_client::RelayHttpClient;
use crate::session::SessionManager;
use crate::state::{AuthContext, ClientState, Session};
use crate::transport::{ConnectionStatus, Transport, TransportEvent, WsTransport};
use alloy_primitives::Address;
use gasless_core::{Error, Result, SessionId, SwapQuote, SwapResult, WalletSigner};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Gasless swap client
pub struct SwapClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    ws: Option<Arc<WsTransport>>,
    correlator: RequestCorrelator,
    signer: Arc<dyn WalletSigner>,
    state: Arc<Mutex<ClientState>>,
    handshake: AuthHandshake,
    sessions: SessionManager,
    pipeline: SignedUpdatePipeline,
    watcher: JoinHandle<()>,
}

impl SwapClient {
    /// Connect to the configured clearing node and relay
    pub async fn connect(config: ClientConfig, signer: Arc<dyn WalletSigner>) -> Result<Self> {
        let ws = Arc::new(WsTransport::new(config.transport.clone()));
        ws.connect().await?;
        let relay = Arc::new(RelayHttpClient::new(&config.relay_url, config.request_timeout)?);

        let transport: Arc<dyn Transport> = ws.clone();
        let mut client = Self::with_transport(config, transport, signer, relay);
        client.ws = Some(ws);
        Ok(client)
    }

    /// Build a client over an existing transport and relay
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        signer: Arc<dyn WalletSigner>,
        relay: Arc<dyn SwapRelay>,
    ) -> Self {
        let state = Arc::new(Mutex::new(ClientState::new()));
        let watcher = tokio::spawn(watch_connection(transport.subscribe(), Arc::clone(&state)));

        Self {
            handshake: AuthHandshake::new(config.auth.clone(), config.request_timeout),
            sessions: SessionManager::new(config.protocol.clone(), config.request_timeout),
            pipeline: SignedUpdatePipeline::new(relay),
            correlator: RequestCorrelator::new(Arc::clone(&transport)),
            transport,
            ws: None,
            signer,
            state,
            watcher,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Wallet address the client acts for
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    /// Run the auth handshake on the current connection
    pub async fn authenticate(&self) -> Result<AuthContext> {
        if !self.transport.is_connected() {
            return Err(Error::NotConnected);
        }
        let mut state = self.state.lock().await;
        let epoch = self.transport.epoch();
        self.handshake
            .authenticate(&mut state, &self.correlator, self.signer.as_ref(), epoch)
            .await
    }

    /// True when authenticated on the current connection
    pub async fn is_authenticated(&self) -> bool {
        let mut state = self.state.lock().await;
        state.observe_epoch(self.transport.epoch());
        state.is_authenticated()
    }

    /// Open a session with `counterparty` denominated in `asset`
    pub async fn create_session(&self, counterparty: Address, asset: &str) -> Result<SessionId> {
        let mut state = self.state.lock().await;
        let epoch = self.transport.epoch();
        self.sessions
            .create_session(
                &mut state,
                &self.correlator,
                self.signer.as_ref(),
                epoch,
                self.signer.address(),
                counterparty,
                asset,
            )
            .await
    }

    /// Close the active session locally
    pub async fn close_session(&self) -> Option<Session> {
        self.state.lock().await.close_session()
    }

    /// Snapshot of the active session
    pub async fn session(&self) -> Option<Session> {
        let mut state = self.state.lock().await;
        state.observe_epoch(self.transport.epoch());
        state.session().cloned()
    }

    /// Sign `quote` and have the relay execute it
    pub async fn propose_swap(&self, quote: &SwapQuote) -> Result<SwapResult> {
        let mut state = self.state.lock().await;
        state.observe_epoch(self.transport.epoch());
        self.pipeline
            .propose_swap(&state, self.signer.as_ref(), quote)
            .await
    }

    /// Close the connection; auth and session are dropped with it
    pub async fn disconnect(&self) {
        if let Some(ws) = &self.ws {
            ws.disconnect().await;
        }
        let epoch = self.transport.epoch();
        self.state.lock().await.on_disconnect(epoch);
    }
}

impl Drop for SwapClient {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Applies disconnect invalidation as soon as the transport reports it
async fn watch_connection(
    mut events: broadcast::Receiver<TransportEvent>,
    state: Arc<Mutex<ClientState>>,
) {
    loop {
        match events.recv().await {
            Ok(TransportEvent::Disconnected { epoch }) => {
                state.lock().await.on_disconnect(epoch);
            }
            Ok(TransportEvent::Connected { epoch }) => {
                info!(epoch, "Connection open; authenticate before use");
            }
            Ok(TransportEvent::Message(_)) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Connection watcher lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
