//! Integration test: client pipeline against a live relay server
//!
//! The client authenticates and opens a session over an in-memory clearing
//! node, then proposes swaps over HTTP to a relay bound on a local port.

use crate::support::{Backend, accepting_node, quote, signed_request};
use gasless_client::{ClientConfig, MemoryTransport, RelayHttpClient, SwapClient};
use gasless_core::{Error, LocalWallet, SignerRole, WalletSigner};
use gasless_relay::{RelayConfig, RelayServer};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn spawn_relay(backend: &Backend) -> String {
    let server = RelayServer::new(backend.service.clone(), RelayConfig::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server.router()).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn client_for(relay_url: &str) -> (SwapClient, Arc<LocalWallet>) {
    let transport = Arc::new(MemoryTransport::connected());
    transport.set_responder(accepting_node());
    let wallet = Arc::new(LocalWallet::random(8453));
    let relay = Arc::new(RelayHttpClient::new(relay_url, Duration::from_secs(5)).unwrap());
    let config = ClientConfig::default()
        .with_request_timeout(Duration::from_secs(2))
        .with_relay_url(relay_url);
    let client = SwapClient::with_transport(config, transport, wallet.clone(), relay);
    (client, wallet)
}

#[tokio::test]
async fn test_client_swaps_through_relay() {
    let backend = Backend::new();
    let url = spawn_relay(&backend).await;
    let (client, wallet) = client_for(&url).await;

    client.authenticate().await.unwrap();
    let session_id = client.create_session(backend.address(), "usdc").await.unwrap();

    let result = client.propose_swap(&quote(5_000_000).await).await.unwrap();
    assert!(result.success);
    assert_eq!(result.tx_hash.as_deref(), Some(format!("0x{:064x}", 1).as_str()));

    let updates = backend.sink.updates.lock();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].session_id, session_id);
    assert!(updates[0].is_executable());
    assert_eq!(
        updates[0].signature_for(SignerRole::User).unwrap().signer,
        wallet.address()
    );
    assert_eq!(
        updates[0].signature_for(SignerRole::Counterparty).unwrap().signer,
        backend.address()
    );
    assert_eq!(backend.broadcaster.calls(), 1);
}

#[tokio::test]
async fn test_repeated_proposals_execute_independently() {
    let backend = Backend::new();
    let url = spawn_relay(&backend).await;
    let (client, _) = client_for(&url).await;

    client.authenticate().await.unwrap();
    client.create_session(backend.address(), "usdc").await.unwrap();

    let quote = quote(5_000_000).await;
    let first = client.propose_swap(&quote).await.unwrap();
    let second = client.propose_swap(&quote).await.unwrap();
    assert!(first.success && second.success);
    assert_ne!(first.tx_hash, second.tx_hash);

    let updates = backend.sink.updates.lock();
    assert_eq!(updates.len(), 2);
    assert!(updates[1].version > updates[0].version);
    assert_eq!(backend.broadcaster.calls(), 2);
}

#[tokio::test]
async fn test_broadcast_failure_surfaces_as_execution_error() {
    let backend = Backend::with_broadcaster(|b| b.failing());
    let url = spawn_relay(&backend).await;
    let (client, _) = client_for(&url).await;

    client.authenticate().await.unwrap();
    client.create_session(backend.address(), "usdc").await.unwrap();

    let err = client.propose_swap(&quote(5_000_000).await).await.unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
    assert_eq!(backend.broadcaster.calls(), 1);
}

#[tokio::test]
async fn test_session_with_other_counterparty_is_refused() {
    let backend = Backend::new();
    let url = spawn_relay(&backend).await;
    let (client, _) = client_for(&url).await;

    client.authenticate().await.unwrap();
    let elsewhere = LocalWallet::random(1).address();
    client.create_session(elsewhere, "usdc").await.unwrap();

    let err = client.propose_swap(&quote(5_000_000).await).await.unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
    assert_eq!(backend.broadcaster.calls(), 0);
}

// ============================================================================
// Raw HTTP
// ============================================================================

#[tokio::test]
async fn test_route_without_call_data_is_rejected_before_broadcast() {
    let backend = Backend::new();
    let url = spawn_relay(&backend).await;
    let user = LocalWallet::random(8453);

    let mut request = signed_request(&user, backend.address(), &quote(5_000_000).await, None).await;
    if let Some(route) = request.proposed_route.as_mut()
        && let Some(call) = route.steps[0].transaction_request.as_mut()
    {
        call.data = None;
    }

    let response = reqwest::Client::new()
        .post(format!("{}/execute-swap", url))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "invalid_route");
    assert_eq!(backend.broadcaster.calls(), 0);
    assert!(backend.sink.updates.lock().is_empty());
}

#[tokio::test]
async fn test_replayed_request_is_conflict() {
    let backend = Backend::new();
    let url = spawn_relay(&backend).await;
    let user = LocalWallet::random(8453);
    let request = signed_request(&user, backend.address(), &quote(5_000_000).await, Some(9)).await;
    let http = reqwest::Client::new();

    let first = http
        .post(format!("{}/execute-swap", url))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["transactionHash"].is_string());

    let second = http
        .post(format!("{}/execute-swap", url))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["code"], "already_executed");
    assert_eq!(backend.broadcaster.calls(), 1);
}

#[tokio::test]
async fn test_health_reflects_executions() {
    let backend = Backend::new();
    let url = spawn_relay(&backend).await;
    let user = LocalWallet::random(8453);
    let request = signed_request(&user, backend.address(), &quote(5_000_000).await, None).await;
    backend.service.execute_swap(request).await.unwrap();

    let body: Value = reqwest::get(format!("{}/health", url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backendAddress"], backend.address().to_checksum(None));
    assert_eq!(body["stats"]["executed"], 1);
}
