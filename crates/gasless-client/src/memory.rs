//! In-memory transport for testing and local development

use crate::transport::{ConnectionStatus, Transport, TransportEvent};
use gasless_core::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};

/// Produces replies for each outbound frame
pub type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

/// In-process transport double
///
/// Outbound frames are queued for inspection and, when a responder is
/// installed, answered synchronously as inbound messages. Connection loss and
/// reconnects are driven explicitly, which makes epoch transitions
/// deterministic in tests.
pub struct MemoryTransport {
    status: RwLock<ConnectionStatus>,
    epoch: AtomicU64,
    events: broadcast::Sender<TransportEvent>,
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    responder: Mutex<Option<Responder>>,
}

impl MemoryTransport {
    /// Create a disconnected transport
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            status: RwLock::new(ConnectionStatus::Disconnected),
            epoch: AtomicU64::new(0),
            events,
            outbound_tx,
            outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            responder: Mutex::new(None),
        }
    }

    /// Create an already connected transport (epoch 1)
    pub fn connected() -> Self {
        let transport = Self::new();
        transport.reconnect();
        transport
    }

    /// Install a responder answering every outbound frame
    pub fn set_responder(&self, responder: Responder) {
        *self.responder.lock() = Some(responder);
    }

    /// Open a new connection epoch
    pub fn reconnect(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.status.write() = ConnectionStatus::Connected;
        let _ = self.events.send(TransportEvent::Connected { epoch });
        epoch
    }

    /// Simulate an unexpected close of the current connection
    pub fn drop_connection(&self) {
        *self.status.write() = ConnectionStatus::Disconnected;
        let epoch = self.epoch.load(Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Disconnected { epoch });
    }

    /// Deliver an inbound frame
    pub fn inject(&self, text: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Message(text.into()));
    }

    /// Next frame the client sent
    pub async fn next_outbound(&self) -> Option<String> {
        self.outbound_rx.lock().await.recv().await
    }

    /// Next sent frame if one is already queued
    pub fn try_outbound(&self) -> Option<String> {
        self.outbound_rx.try_lock().ok()?.try_recv().ok()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn send(&self, message: String) -> Result<()> {
        if self.status() != ConnectionStatus::Connected {
            return Err(Error::NotConnected);
        }

        let replies = match self.responder.lock().as_mut() {
            Some(responder) => responder(&message),
            None => Vec::new(),
        };
        let _ = self.outbound_tx.send(message);
        for reply in replies {
            self.inject(reply);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}
