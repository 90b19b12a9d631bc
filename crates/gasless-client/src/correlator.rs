//! # Request Correlator
//!
//! Matches inbound responses to outstanding requests by expected method tag.
//! At most one request per tag is in flight; a second concurrent request for
//! the same tag is rejected with [`Error::DuplicateRequest`].
//!
//! An inbound `error` response rejects the pending request with the same id
//! when there is one, and otherwise every pending request, since the relay
//! may not echo the id. A transport disconnect rejects everything sent on
//! that connection (or an earlier one) at once instead of leaving callers to
//! their individual timeouts. Requests sent after a reconnect are unaffected
//! by a late disconnect event for the old connection.

use crate::transport::{Transport, TransportEvent};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use gasless_core::rpc::RpcResponse;
use gasless_core::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outstanding request awaiting a response
struct PendingRequest {
    request_id: u64,
    /// Transport epoch the request was sent on
    epoch: u64,
    created_at: Instant,
    responder: oneshot::Sender<Result<RpcResponse>>,
}

type PendingTable = DashMap<String, PendingRequest>;

/// Registry of in-flight requests keyed by expected response tag
pub struct RequestCorrelator {
    transport: Arc<dyn Transport>,
    pending: Arc<PendingTable>,
    next_id: AtomicU64,
    dispatcher: JoinHandle<()>,
}

impl RequestCorrelator {
    /// Create a correlator listening on `transport`
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let pending = Arc::new(PendingTable::new());
        let events = transport.subscribe();
        let dispatcher = tokio::spawn(dispatch(events, Arc::clone(&pending)));
        Self {
            transport,
            pending,
            next_id: AtomicU64::new(1),
            dispatcher,
        }
    }

    /// Allocate a request id
    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of requests currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Send `message` and wait for the first response tagged `expected_tag`
    pub async fn send_and_await(
        &self,
        request_id: u64,
        expected_tag: &str,
        message: String,
        timeout: Duration,
    ) -> Result<RpcResponse> {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(expected_tag.to_string()) {
            Entry::Occupied(_) => return Err(Error::DuplicateRequest(expected_tag.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    request_id,
                    epoch: self.transport.epoch(),
                    created_at: Instant::now(),
                    responder: tx,
                });
            }
        }

        // Deregisters on every exit path, including cancellation
        let _guard = PendingGuard {
            pending: &self.pending,
            tag: expected_tag,
            request_id,
        };

        self.transport.send(message)?;
        debug!(request_id, tag = expected_tag, "Request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Connection("request abandoned".into())),
            Err(_) => {
                warn!(request_id, tag = expected_tag, "Request timed out");
                Err(Error::Timeout(expected_tag.to_string()))
            }
        }
    }
}

impl Drop for RequestCorrelator {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

struct PendingGuard<'a> {
    pending: &'a PendingTable,
    tag: &'a str,
    request_id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let id = self.request_id;
        self.pending.remove_if(self.tag, |_, p| p.request_id == id);
    }
}

async fn dispatch(mut events: broadcast::Receiver<TransportEvent>, pending: Arc<PendingTable>) {
    loop {
        match events.recv().await {
            Ok(TransportEvent::Message(text)) => route(&pending, &text),
            Ok(TransportEvent::Disconnected { epoch }) => {
                reject_where(
                    &pending,
                    |request| request.epoch <= epoch,
                    || Error::Connection(format!("connection lost (epoch {epoch})")),
                );
            }
            Ok(TransportEvent::Connected { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Correlator lagged behind transport events");
            }
            Err(broadcast::error::RecvError::Closed) => {
                reject_all(&pending, || Error::Connection("transport closed".into()));
                break;
            }
        }
    }
}

fn route(pending: &PendingTable, text: &str) {
    let response = match RpcResponse::parse(text) {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "Ignoring unparseable message");
            return;
        }
    };

    if response.is_error() {
        let reason = response.error_reason();
        let matching = if response.id == 0 {
            None
        } else {
            pending
                .iter()
                .find(|entry| entry.value().request_id == response.id)
                .map(|entry| entry.key().clone())
        };

        match matching.and_then(|tag| pending.remove(&tag)) {
            Some((tag, request)) => {
                debug!(tag = %tag, request_id = request.request_id, reason = %reason, "Request rejected");
                let _ = request.responder.send(Err(Error::Server(reason)));
            }
            None => reject_all(pending, || Error::Server(reason.clone())),
        }
        return;
    }

    match pending.remove(&response.method) {
        Some((tag, request)) => {
            debug!(
                tag = %tag,
                request_id = request.request_id,
                elapsed_ms = request.created_at.elapsed().as_millis() as u64,
                "Response matched"
            );
            let _ = request.responder.send(Ok(response));
        }
        None => debug!(method = %response.method, "Unsolicited message"),
    }
}

fn reject_all(pending: &PendingTable, make_error: impl Fn() -> Error) {
    reject_where(pending, |_| true, make_error);
}

fn reject_where(
    pending: &PendingTable,
    applies: impl Fn(&PendingRequest) -> bool,
    make_error: impl Fn() -> Error,
) {
    let tags: Vec<String> = pending
        .iter()
        .filter(|entry| applies(entry.value()))
        .map(|entry| entry.key().clone())
        .collect();
    for tag in tags {
        if let Some((_, request)) = pending.remove_if(&tag, |_, request| applies(request)) {
            let _ = request.responder.send(Err(make_error()));
        }
    }
}
