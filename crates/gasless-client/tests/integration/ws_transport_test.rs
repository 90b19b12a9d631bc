//! Integration test: WebSocket transport against a local server

use crate::support::StubRelay;
use crate::support::mock_clearnode::{Behavior, MockClearnode};
use alloy_primitives::Address;
use futures_util::{SinkExt, StreamExt};
use gasless_client::{
    ClientConfig, ConnectionStatus, SwapClient, Transport, TransportConfig, TransportEvent,
    WsTransport,
};
use gasless_core::{Error, LocalWallet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Mock clearing node reachable at `url`
struct Node {
    url: String,
    /// Every send closes all open connections
    kick: broadcast::Sender<()>,
    /// Ping frames received across all connections
    pings: Arc<AtomicUsize>,
}

impl Node {
    fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

async fn spawn_node() -> Node {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (kick, _) = broadcast::channel(4);
    let pings = Arc::new(AtomicUsize::new(0));
    let kicker = kick.clone();
    let counter = Arc::clone(&pings);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let mut kicked = kicker.subscribe();
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let Ok(ws) = accept_async(stream).await else {
                    return;
                };
                let (mut write, mut read) = ws.split();
                let mut node = MockClearnode::new(Behavior::Normal);
                loop {
                    tokio::select! {
                        _ = kicked.recv() => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                        incoming = read.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                for reply in node.respond(&text) {
                                    if write.send(Message::Text(reply)).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(_))) => {
                                counter.fetch_add(1, Ordering::SeqCst);
                            }
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                    }
                }
            });
        }
    });

    Node {
        url: format!("ws://{}", addr),
        kick,
        pings,
    }
}

async fn wait_for_connected(events: &mut broadcast::Receiver<TransportEvent>, epoch: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(TransportEvent::Connected { epoch: e }) = events.recv().await
                && e == epoch
            {
                return;
            }
        }
    })
    .await
    .expect("reconnected in time");
}

#[tokio::test]
async fn test_connect_authenticate_over_websocket() {
    let node = spawn_node().await;
    let transport = Arc::new(WsTransport::new(TransportConfig::new(&node.url)));
    transport.connect().await.unwrap();
    assert_eq!(transport.status(), ConnectionStatus::Connected);
    assert_eq!(transport.epoch(), 1);

    let client = SwapClient::with_transport(
        ClientConfig::default().with_request_timeout(Duration::from_secs(2)),
        transport.clone(),
        Arc::new(LocalWallet::random(8453)),
        Arc::new(StubRelay::default()),
    );
    client.authenticate().await.unwrap();
    client
        .create_session(Address::repeat_byte(0x42), "usdc")
        .await
        .unwrap();

    transport.disconnect().await;
    assert_eq!(transport.status(), ConnectionStatus::Disconnected);
    assert!(matches!(transport.send("x".into()), Err(Error::NotConnected)));
}

#[tokio::test]
async fn test_reconnect_bumps_epoch_and_requires_reauth() {
    let node = spawn_node().await;
    let transport = Arc::new(WsTransport::new(
        TransportConfig::new(&node.url).with_reconnect_delay(Duration::from_millis(100)),
    ));
    transport.connect().await.unwrap();
    let mut events = transport.subscribe();

    let client = SwapClient::with_transport(
        ClientConfig::default().with_request_timeout(Duration::from_secs(2)),
        transport.clone(),
        Arc::new(LocalWallet::random(8453)),
        Arc::new(StubRelay::default()),
    );
    client.authenticate().await.unwrap();

    node.kick.send(()).unwrap();
    wait_for_connected(&mut events, 2).await;
    assert_eq!(transport.epoch(), 2);

    let err = client
        .create_session(Address::repeat_byte(0x42), "usdc")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAuthenticated));

    client.authenticate().await.unwrap();
    client
        .create_session(Address::repeat_byte(0x42), "usdc")
        .await
        .unwrap();

    transport.disconnect().await;
}

#[tokio::test]
async fn test_no_reconnect_when_disabled() {
    let node = spawn_node().await;
    let transport = Arc::new(WsTransport::new(TransportConfig::new(&node.url).without_reconnect()));
    transport.connect().await.unwrap();
    let mut events = transport.subscribe();

    node.kick.send(()).unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, TransportEvent::Disconnected { epoch: 1 });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.status(), ConnectionStatus::Disconnected);
    assert_eq!(transport.epoch(), 1);
}

// ============================================================================
// Keep-alive
// ============================================================================

async fn wait_for_pings(node: &Node, at_least: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while node.pings() < at_least {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pings arrived in time");
}

#[tokio::test]
async fn test_keepalive_pings_while_connected() {
    let node = spawn_node().await;
    let transport = WsTransport::new(
        TransportConfig::new(&node.url).with_keepalive_interval(Duration::from_millis(50)),
    );
    transport.connect().await.unwrap();

    wait_for_pings(&node, 3).await;

    transport.disconnect().await;
    // let frames already on the wire land before sampling
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_disconnect = node.pings();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(node.pings(), after_disconnect);
}

#[tokio::test]
async fn test_keepalive_stops_when_server_closes() {
    let node = spawn_node().await;
    let transport = WsTransport::new(
        TransportConfig::new(&node.url)
            .with_keepalive_interval(Duration::from_millis(50))
            .without_reconnect(),
    );
    transport.connect().await.unwrap();
    let mut events = transport.subscribe();
    wait_for_pings(&node, 1).await;

    node.kick.send(()).unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, TransportEvent::Disconnected { epoch: 1 });

    let after_close = node.pings();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(node.pings(), after_close);
    assert_eq!(transport.status(), ConnectionStatus::Disconnected);
}

// ============================================================================
// Late Node
// ============================================================================

#[tokio::test]
async fn test_spawn_connect_waits_for_late_node() {
    // Reserve a port with nothing listening on it yet
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let transport = WsTransport::new(
        TransportConfig::new(format!("ws://{}", addr))
            .with_connect_timeout(Duration::from_secs(1))
            .with_reconnect_delay(Duration::from_millis(50)),
    );
    let mut events = transport.subscribe();

    assert!(transport.connect().await.is_err());
    transport.spawn_connect();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_ne!(transport.status(), ConnectionStatus::Connected);
    assert_eq!(transport.epoch(), 0);

    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Ok(mut ws) = accept_async(stream).await {
                    while let Some(Ok(_)) = ws.next().await {}
                }
            });
        }
    });

    wait_for_connected(&mut events, 1).await;
    assert!(transport.is_connected());
    transport.send("hello".into()).unwrap();
    transport.disconnect().await;
}
