// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end websocket scenarios against a relay on a real listener.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use bridge_relay::config::RelayConfig;
use bridge_relay::state::RelayState;
use bridge_relay::stats;
use bridge_relay::transport::build_router;

type Client = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestRelay {
    addr: String,
    state: Arc<RelayState>,
}

impl TestRelay {
    fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

async fn start_relay() -> TestRelay {
    let config = RelayConfig { address: "127.0.0.1:0".into(), static_dir: "./static".into() };
    let shutdown = CancellationToken::new();
    let state = Arc::new(RelayState::new(config, shutdown.clone()));
    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr").to_string();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
    });
    TestRelay { addr, state }
}

async fn connect(relay: &TestRelay, path: &str) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(relay.url(path))
        .await
        .expect("websocket handshake");
    client
}

/// Next data frame, skipping protocol frames.
async fn recv(client: &mut Client) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended unexpectedly")
            .expect("websocket error");
        match msg {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

/// Wait for a close frame and return its code and reason.
async fn next_close<S>(stream: &mut S) -> (u16, String)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), stream.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended without a close frame")
            .expect("websocket error before close");
        if let Message::Close(Some(frame)) = msg {
            return (u16::from(frame.code), frame.reason.to_string());
        }
    }
}

fn frame_json(frame: &Message) -> serde_json::Value {
    let Message::Text(text) = frame else {
        panic!("expected a text frame, got {frame:?}");
    };
    serde_json::from_str(text.as_str()).expect("frame JSON")
}

/// Read the connect notification off the control socket and return the
/// minted connection id.
async fn read_connect_notification(control: &mut Client) -> String {
    let value = frame_json(&recv(control).await);
    assert_eq!(value["type"], "connect");
    value["data"]["connectionId"].as_str().expect("connectionId").to_owned()
}

/// Raw HTTP GET against the relay, returning the response body.
async fn http_get(addr: &str, path: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.expect("write request");
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.expect("read response");
    let response = String::from_utf8(buf).expect("utf8 response");
    response.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("").to_owned()
}

// -- Rendezvous ---------------------------------------------------------------

#[tokio::test]
async fn rendezvous_forwards_both_directions() {
    let relay = start_relay().await;
    let mut control = connect(&relay, "/bridge/control/living-room").await;
    let mut remote = connect(&relay, "/remote-controller/living-room").await;

    let connection_id = read_connect_notification(&mut control).await;
    let mut data = connect(&relay, &format!("/bridge/data/living-room/{connection_id}")).await;

    remote
        .send(Message::Binary(vec![0xDE, 0xAD, 0xBE, 0xEF].into()))
        .await
        .expect("send binary");
    assert_eq!(recv(&mut data).await, Message::Binary(vec![0xDE, 0xAD, 0xBE, 0xEF].into()));

    data.send(Message::Text("hello".into())).await.expect("send text");
    assert_eq!(recv(&mut remote).await, Message::Text("hello".into()));

    remote.close(None).await.expect("close remote");
    let (code, _) = next_close(&mut data).await;
    assert_eq!(code, 1001);
}

#[tokio::test]
async fn connection_ids_are_canonical_uuids() {
    let relay = start_relay().await;
    let mut control = connect(&relay, "/bridge/control/kitchen").await;
    let _remote = connect(&relay, "/remote-controller/kitchen").await;

    let connection_id = read_connect_notification(&mut control).await;
    assert_eq!(connection_id.len(), 36);
    assert_eq!(connection_id.matches('-').count(), 4);
}

#[tokio::test]
async fn pending_frame_disconnects_the_remote_controller() {
    let relay = start_relay().await;
    let mut control = connect(&relay, "/bridge/control/hall").await;
    let mut remote = connect(&relay, "/remote-controller/hall").await;
    let connection_id = read_connect_notification(&mut control).await;

    // No data leg yet: the frame is discarded and the session ends.
    remote.send(Message::Text("early".into())).await.expect("send");
    let (code, _) = next_close(&mut remote).await;
    assert_eq!(code, 1001);

    // The connection id is gone, so a late data dial finds nothing.
    let mut data = connect(&relay, &format!("/bridge/data/hall/{connection_id}")).await;
    let (code, _) = next_close(&mut data).await;
    assert_eq!(code, 1001);
}

#[tokio::test]
async fn data_socket_for_an_unknown_connection_is_closed() {
    let relay = start_relay().await;
    let _control = connect(&relay, "/bridge/control/attic").await;

    let mut ghost = connect(&relay, "/bridge/data/attic/ghost").await;
    let (code, _) = next_close(&mut ghost).await;
    assert_eq!(code, 1001);
}

#[tokio::test]
async fn data_socket_for_an_unknown_bridge_is_closed() {
    let relay = start_relay().await;
    let mut orphan = connect(&relay, "/bridge/data/nowhere/any").await;
    let (code, _) = next_close(&mut orphan).await;
    assert_eq!(code, 1001);
}

// -- Registration and eviction ------------------------------------------------

#[tokio::test]
async fn second_bridge_kicks_the_first() {
    let relay = start_relay().await;
    let mut first = connect(&relay, "/bridge/control/garage").await;
    let mut second = connect(&relay, "/bridge/control/garage").await;

    let (code, reason) = next_close(&mut first).await;
    assert_eq!(code, 3000);
    assert_eq!(reason, "Kicked out by other bridge");
    assert_eq!(stats::read(&relay.state.counters.kicked_bridges), 1);
    assert_eq!(relay.state.registry.count().await, 1);

    // The id now resolves to the second bridge.
    let _remote = connect(&relay, "/remote-controller/garage").await;
    let connection_id = read_connect_notification(&mut second).await;
    assert!(!connection_id.is_empty());
}

#[tokio::test]
async fn kick_tears_down_the_old_bridges_connections() {
    let relay = start_relay().await;
    let mut control = connect(&relay, "/bridge/control/cellar").await;
    let mut remote = connect(&relay, "/remote-controller/cellar").await;
    let connection_id = read_connect_notification(&mut control).await;
    let mut data = connect(&relay, &format!("/bridge/data/cellar/{connection_id}")).await;

    let _usurper = connect(&relay, "/bridge/control/cellar").await;

    let (code, _) = next_close(&mut remote).await;
    assert_eq!(code, 1001);
    let (code, _) = next_close(&mut data).await;
    assert_eq!(code, 1001);
    let (code, _) = next_close(&mut control).await;
    assert_eq!(code, 3000);
}

#[tokio::test]
async fn remote_controller_without_a_bridge_is_not_upgraded() {
    let relay = start_relay().await;

    let err = tokio_tungstenite::connect_async(relay.url("/remote-controller/nobody"))
        .await
        .err()
        .expect("handshake must be refused");
    match err {
        WsError::Http(response) => assert_eq!(response.status(), 404),
        other => panic!("unexpected handshake error: {other}"),
    }
    assert_eq!(
        stats::read(&relay.state.counters.rejected_remote_controller_websockets_no_bridge),
        1
    );
}

#[tokio::test]
async fn bridge_disconnect_deregisters_and_closes_members() {
    let relay = start_relay().await;
    let mut control = connect(&relay, "/bridge/control/shed").await;
    let mut remote = connect(&relay, "/remote-controller/shed").await;
    let _connection_id = read_connect_notification(&mut control).await;

    control.close(None).await.expect("close control");

    let (code, _) = next_close(&mut remote).await;
    assert_eq!(code, 1001);

    // Deregistered: the next remote controller is refused.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(relay.state.registry.count().await, 0);
    assert!(tokio_tungstenite::connect_async(relay.url("/remote-controller/shed"))
        .await
        .is_err());
}

// -- Rate limiting ------------------------------------------------------------

#[tokio::test]
async fn burst_exhaustion_closes_the_session_with_3001() {
    let relay = start_relay().await;
    let mut control = connect(&relay, "/bridge/control/studio").await;
    let remote = connect(&relay, "/remote-controller/studio").await;
    let connection_id = read_connect_notification(&mut control).await;
    let data = connect(&relay, &format!("/bridge/data/studio/{connection_id}")).await;

    // Drain the data side concurrently so forwarding never backs up.
    let drain = tokio::spawn(async move {
        let mut data = data;
        next_close(&mut data).await
    });

    // 10 Mbit of burst is 1_250_000 bytes; 2_000_000 bytes in tight
    // succession must trip the bucket.
    let (mut remote_tx, mut remote_rx) = remote.split();
    let sender = tokio::spawn(async move {
        let chunk = vec![0u8; 250_000];
        for _ in 0..8 {
            if remote_tx.send(Message::Binary(chunk.clone().into())).await.is_err() {
                break;
            }
        }
    });

    let (code, reason) = next_close(&mut remote_rx).await;
    assert_eq!(code, 3001);
    assert_eq!(reason, "Rate limit exceeded");

    let (code, _) = drain.await.expect("join drain");
    assert_eq!(code, 3001);
    sender.await.expect("join sender");

    assert_eq!(stats::read(&relay.state.counters.rate_limit_exceeded), 1);
}

// -- Status subscribers -------------------------------------------------------

#[tokio::test]
async fn status_lifecycle_notifies_the_bridge_and_fans_out() {
    let relay = start_relay().await;
    let mut control = connect(&relay, "/bridge/control/porch").await;

    let mut sub_a = connect(&relay, "/status/porch").await;
    assert_eq!(frame_json(&recv(&mut control).await)["type"], "startStatus");

    let mut sub_b = connect(&relay, "/status/porch").await;
    // Let the second subscription land before publishing.
    tokio::time::sleep(Duration::from_millis(200)).await;

    control.send(Message::Text("{\"status\":\"live\"}".into())).await.expect("send");
    control.send(Message::Binary(vec![1, 2, 3].into())).await.expect("send");

    for sub in [&mut sub_a, &mut sub_b] {
        assert_eq!(recv(sub).await, Message::Text("{\"status\":\"live\"}".into()));
        assert_eq!(recv(sub).await, Message::Binary(vec![1, 2, 3].into()));
    }

    sub_a.close(None).await.expect("close first subscriber");
    // No stopStatus while a subscriber remains.
    let quiet = tokio::time::timeout(Duration::from_millis(300), control.next()).await;
    assert!(quiet.is_err(), "control saw a frame while a subscriber remained");

    sub_b.close(None).await.expect("close last subscriber");
    assert_eq!(frame_json(&recv(&mut control).await)["type"], "stopStatus");
}

#[tokio::test]
async fn status_subscriber_for_an_unknown_bridge_is_closed() {
    let relay = start_relay().await;
    let mut subscriber = connect(&relay, "/status/nowhere").await;
    let (code, _) = next_close(&mut subscriber).await;
    assert_eq!(code, 1001);
}

// -- Stats over the wire ------------------------------------------------------

#[tokio::test]
async fn stats_json_counts_live_bridges_and_bytes() {
    let relay = start_relay().await;
    let mut control = connect(&relay, "/bridge/control/den").await;
    let mut remote = connect(&relay, "/remote-controller/den").await;
    let connection_id = read_connect_notification(&mut control).await;
    let mut data = connect(&relay, &format!("/bridge/data/den/{connection_id}")).await;

    remote.send(Message::Binary(vec![0u8; 64].into())).await.expect("send");
    assert_eq!(recv(&mut data).await, Message::Binary(vec![0u8; 64].into()));
    data.send(Message::Text("ack".into())).await.expect("send");
    assert_eq!(recv(&mut remote).await, Message::Text("ack".into()));

    let body = http_get(&relay.addr, "/stats.json").await;
    let value: serde_json::Value = serde_json::from_str(&body).expect("stats JSON");
    assert_eq!(value["bridgesConnected"], 1);
    assert_eq!(value["acceptedBridgeControlWebsockets"], 1);
    assert_eq!(value["acceptedBridgeDataWebsockets"], 1);
    assert_eq!(value["acceptedRemoteControllerWebsockets"], 1);
    assert_eq!(value["remoteControllerToBridgeBytes"], 64);
    assert_eq!(value["bridgeToRemoteControllerBytes"], 3);
}
