//! # Transport Channel
//!
//! One persistent bidirectional connection to the clearing node. The
//! [`Transport`] trait is what the rest of the client sees; [`WsTransport`]
//! implements it over WebSocket with keep-alive pings and fixed-delay
//! reconnects.
//!
//! Every successful open bumps the connection *epoch*. Anything derived from
//! a connection (auth context, session) records the epoch it was created in
//! and is invalid once the epoch moves on.

use crate::config::TransportConfig;
use futures_util::{SinkExt, StreamExt};
use gasless_core::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Lifecycle and inbound traffic of a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection opened as `epoch`
    Connected { epoch: u64 },
    /// Inbound text frame
    Message(String),
    /// Connection `epoch` closed
    Disconnected { epoch: u64 },
}

/// Bidirectional message channel to the clearing node
pub trait Transport: Send + Sync {
    fn status(&self) -> ConnectionStatus;

    /// Epoch of the current (or last) connection; 0 before the first open
    fn epoch(&self) -> u64;

    /// Queue a text frame; fails with [`Error::NotConnected`] unless connected
    fn send(&self, message: String) -> Result<()>;

    /// Subscribe to lifecycle events and inbound messages
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

// ============================================================================
// WebSocket Transport
// ============================================================================

struct Shared {
    config: TransportConfig,
    status: RwLock<ConnectionStatus>,
    epoch: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    events: broadcast::Sender<TransportEvent>,
    shutdown: watch::Sender<bool>,
}

/// WebSocket transport with keep-alive and auto-reconnect
pub struct WsTransport {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub fn new(config: TransportConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                status: RwLock::new(ConnectionStatus::Disconnected),
                epoch: AtomicU64::new(0),
                outbound: Mutex::new(None),
                events,
                shutdown,
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Open the connection, resolving once the socket is open
    ///
    /// After an unexpected close the transport reconnects on its own every
    /// `reconnect_delay` until [`Self::disconnect`] is called.
    pub async fn connect(&self) -> Result<()> {
        if self.status() == ConnectionStatus::Connected {
            return Ok(());
        }
        self.reset_supervisor();

        let stream = match open(&self.shared.config).await {
            Ok(stream) => stream,
            Err(e) => {
                *self.shared.status.write() = ConnectionStatus::Disconnected;
                return Err(e);
            }
        };

        // Mark connected before returning so callers can send immediately
        let live = self.shared.activate(stream);
        let handle = tokio::spawn(supervise(Arc::clone(&self.shared), Some(live)));
        *self.supervisor.lock() = Some(handle);
        Ok(())
    }

    /// Connect in the background, retrying every `reconnect_delay` until the
    /// first open succeeds
    ///
    /// Returns immediately; watch [`Transport::subscribe`] for
    /// [`TransportEvent::Connected`]. Must be called inside a tokio runtime.
    pub fn spawn_connect(&self) {
        if self.status() == ConnectionStatus::Connected {
            return;
        }
        self.reset_supervisor();
        let handle = tokio::spawn(supervise(Arc::clone(&self.shared), None));
        *self.supervisor.lock() = Some(handle);
    }

    fn reset_supervisor(&self) {
        if let Some(previous) = self.supervisor.lock().take() {
            previous.abort();
        }
        self.shared.shutdown.send_replace(false);
        *self.shared.status.write() = ConnectionStatus::Connecting;
    }

    /// Close the connection and stop reconnecting
    pub async fn disconnect(&self) {
        self.shared.shutdown.send_replace(true);
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(std::time::Duration::from_secs(5), handle)
                .await
                .is_err()
            {
                warn!("Transport did not shut down in time");
            }
        }
        *self.shared.status.write() = ConnectionStatus::Disconnected;
    }
}

impl Transport for WsTransport {
    fn status(&self) -> ConnectionStatus {
        *self.shared.status.read()
    }

    fn epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    fn send(&self, message: String) -> Result<()> {
        if self.status() != ConnectionStatus::Connected {
            return Err(Error::NotConnected);
        }
        let outbound = self.shared.outbound.lock();
        let tx = outbound.as_ref().ok_or(Error::NotConnected)?;
        tx.send(Message::Text(message))
            .map_err(|_| Error::NotConnected)
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.shared.shutdown.send_replace(true);
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
    }
}

/// Socket that has just been opened as `epoch`
struct Live {
    stream: WsStream,
    outbound: mpsc::UnboundedReceiver<Message>,
    epoch: u64,
}

impl Shared {
    /// Start a new epoch on `stream` and route outbound frames to it
    fn activate(&self, stream: WsStream) -> Live {
        let (tx, outbound) = mpsc::unbounded_channel();
        *self.outbound.lock() = Some(tx);
        let epoch = self.begin_epoch();
        Live {
            stream,
            outbound,
            epoch,
        }
    }

    fn begin_epoch(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.status.write() = ConnectionStatus::Connected;
        info!(url = %self.config.url, epoch, "Connected to clearing node");
        let _ = self.events.send(TransportEvent::Connected { epoch });
        epoch
    }

    fn end_epoch(&self, epoch: u64) {
        *self.outbound.lock() = None;
        *self.status.write() = ConnectionStatus::Disconnected;
        info!(epoch, "Clearing node connection closed");
        let _ = self.events.send(TransportEvent::Disconnected { epoch });
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

async fn open(config: &TransportConfig) -> Result<WsStream> {
    let (stream, _) = tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str()))
        .await
        .map_err(|_| Error::Connection(format!("timed out connecting to {}", config.url)))?
        .map_err(|e| Error::Connection(format!("WebSocket connection failed: {}", e)))?;
    Ok(stream)
}

/// Owns the socket for its whole life: runs each connection, then reconnects
///
/// Started without a connection it keeps opening until one succeeds. After a
/// connection closes it only reopens when `auto_reconnect` is set.
async fn supervise(shared: Arc<Shared>, mut live: Option<Live>) {
    let mut shutdown = shared.shutdown.subscribe();
    loop {
        if let Some(Live {
            stream,
            outbound,
            epoch,
        }) = live.take()
        {
            run_connection(&shared, stream, outbound).await;
            shared.end_epoch(epoch);
            if !shared.config.auto_reconnect || !backoff(&shared, &mut shutdown).await {
                return;
            }
        }
        if shared.is_shutting_down() {
            return;
        }

        *shared.status.write() = ConnectionStatus::Connecting;
        let opened = tokio::select! {
            _ = shutdown.changed() => return,
            opened = open(&shared.config) => opened,
        };
        match opened {
            Ok(stream) => live = Some(shared.activate(stream)),
            Err(e) => {
                *shared.status.write() = ConnectionStatus::Disconnected;
                warn!(
                    url = %shared.config.url,
                    error = %e,
                    retry_in_ms = shared.config.reconnect_delay.as_millis() as u64,
                    "Connect attempt failed"
                );
                if !backoff(&shared, &mut shutdown).await {
                    return;
                }
            }
        }
    }
}

/// Wait out `reconnect_delay`; false once shutdown was requested
async fn backoff(shared: &Shared, shutdown: &mut watch::Receiver<bool>) -> bool {
    if shared.is_shutting_down() {
        return false;
    }
    tokio::select! {
        _ = shutdown.changed() => {}
        _ = tokio::time::sleep(shared.config.reconnect_delay) => {}
    }
    !shared.is_shutting_down()
}

/// Pump one connection until it closes or shutdown is requested
async fn run_connection(
    shared: &Shared,
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    let (mut write, mut read) = stream.split();
    let mut shutdown = shared.shutdown.subscribe();
    if *shutdown.borrow_and_update() {
        let _ = write.send(Message::Close(None)).await;
        return;
    }

    let interval = shared.config.keepalive_interval;
    let mut keepalive = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            Some(message) = outbound.recv() => {
                if let Err(e) = write.send(message).await {
                    warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            _ = keepalive.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    warn!(error = %e, "Keep-alive ping failed");
                    break;
                }
                debug!("Keep-alive ping sent");
            }
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = shared.events.send(TransportEvent::Message(text));
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("WebSocket closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    break;
                }
            },
        }
    }
}
