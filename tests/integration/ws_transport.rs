// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! End-to-end tests: relay service over the WebSocket transport.
//!
//! Starts a `WsTransport` on an OS-assigned port, runs a `RelayService` on
//! it, and drives it with real `tokio-tungstenite` clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lanchat_proto::{MessageKind, Packet, SHUTDOWN_BODY, decode};
use lanchat_relay::registry::Registry;
use lanchat_relay::service::{ExitReason, RelayService, ServiceConfig, ServiceError};
use lanchat_relay::transport::TransportError;
use lanchat_relay::transport::ws::WsTransport;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;

type Client =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_relay() -> (
    SocketAddr,
    Arc<Registry>,
    JoinHandle<Result<ExitReason, ServiceError>>,
) {
    let (transport, addr, _server) = WsTransport::bind("127.0.0.1:0").await.unwrap();
    let registry = Arc::new(Registry::new());
    let service = RelayService::new(
        Arc::new(transport),
        Arc::clone(&registry),
        ServiceConfig {
            relay_endpoint: "relay".to_string(),
            ..ServiceConfig::default()
        },
    );
    (addr, registry, tokio::spawn(service.run()))
}

async fn open(addr: SocketAddr, endpoint: &str) -> Client {
    let url = format!("ws://{addr}/ws?endpoint={endpoint}");
    let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    ws
}

async fn send(client: &mut Client, body: &str) {
    client
        .send(tungstenite::Message::Text(body.into()))
        .await
        .unwrap();
}

async fn recv_packet(client: &mut Client) -> Packet {
    let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("recv timed out")
        .unwrap()
        .unwrap();
    decode(msg.into_text().unwrap().as_str()).unwrap()
}

/// Opens a connection for `alias` and registers it with the relay.
async fn join(addr: SocketAddr, registry: &Registry, alias: &str) -> Client {
    let endpoint = format!("host-{alias}");
    let mut client = open(addr, &endpoint).await;
    send(&mut client, &Packet::connect(alias, endpoint).to_string()).await;
    for _ in 0..200 {
        if registry.contains(alias) {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{alias} never registered");
}

#[tokio::test]
async fn peers_learn_of_newcomers_and_receive_broadcasts() {
    let (addr, registry, relay) = start_relay().await;

    let mut alice = join(addr, &registry, "alice").await;
    let mut bob = join(addr, &registry, "bob").await;

    let note = recv_packet(&mut alice).await;
    assert_eq!((note.kind, note.alias.as_str()), (MessageKind::Connect, "bob"));
    assert_eq!(note.origin_endpoint, "relay");

    let mut carol = join(addr, &registry, "carol").await;
    for client in [&mut alice, &mut bob] {
        let note = recv_packet(client).await;
        assert_eq!((note.kind, note.alias.as_str()), (MessageKind::Connect, "carol"));
    }

    send(
        &mut alice,
        &Packet::broadcast("alice", "host-alice", "hi").to_string(),
    )
    .await;
    for client in [&mut bob, &mut carol] {
        let got = recv_packet(client).await;
        assert_eq!(got.kind, MessageKind::Broadcast);
        assert_eq!(got.alias, "alice");
        assert_eq!(got.payload, "hi");
    }

    send(&mut alice, SHUTDOWN_BODY).await;
    let exit = tokio::time::timeout(Duration::from_secs(5), relay)
        .await
        .expect("relay did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(exit, ExitReason::ShutdownPacket);
}

#[tokio::test]
async fn private_message_reaches_only_its_target() {
    let (addr, registry, relay) = start_relay().await;

    let mut alice = join(addr, &registry, "alice").await;
    let mut bob = join(addr, &registry, "bob").await;
    let _ = recv_packet(&mut alice).await; // bob joined

    send(
        &mut alice,
        &Packet::private("alice", "host-alice", "bob", "psst").to_string(),
    )
    .await;
    let got = recv_packet(&mut bob).await;
    assert_eq!(got.kind, MessageKind::Private);
    assert_eq!(got.payload, "psst");
    assert_eq!(got.target, "bob");

    send(&mut bob, &Packet::disconnect("bob", "host-bob").to_string()).await;
    let note = recv_packet(&mut alice).await;
    assert_eq!((note.kind, note.alias.as_str()), (MessageKind::Disconnect, "bob"));

    relay.abort();
}

#[tokio::test]
async fn malformed_frames_do_not_stop_the_relay() {
    let (addr, registry, relay) = start_relay().await;

    let mut stray = open(addr, "host-stray").await;
    send(&mut stray, "not,a,packet").await;
    send(&mut stray, "").await;

    let _alice = join(addr, &registry, "alice").await;
    assert!(registry.contains("alice"));
    assert!(!relay.is_finished());
    relay.abort();
}

#[tokio::test]
async fn server_task_ending_stops_relay_with_transport_error() {
    let (transport, addr, server) = WsTransport::bind("127.0.0.1:0").await.unwrap();
    let registry = Arc::new(Registry::new());
    let service = RelayService::new(
        Arc::new(transport),
        Arc::clone(&registry),
        ServiceConfig::default(),
    );
    let relay = tokio::spawn(service.run());

    let _alice = join(addr, &registry, "alice").await;
    server.abort();

    let result = tokio::time::timeout(Duration::from_secs(5), relay)
        .await
        .expect("relay kept waiting after the server stopped")
        .unwrap();
    assert!(matches!(
        result,
        Err(ServiceError::Transport(TransportError::Closed))
    ));
}
