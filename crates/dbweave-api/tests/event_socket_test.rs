// End-to-end tests for `EventSocket` against an in-process WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use dbweave_api::{
    EventSocket, EventSocketConfig, ServerEventId, SessionExpiredLatch, SocketGates, SocketState,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn listener() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}/api/ws")).unwrap();
    (listener, url)
}

fn fast_config() -> EventSocketConfig {
    EventSocketConfig {
        reconnect_interval: Duration::from_millis(50),
        keep_alive_interval: Duration::from_secs(60),
    }
}

async fn wait_for_state(rx: &mut watch::Receiver<SocketState>, wanted: SocketState) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == wanted))
        .await
        .expect("timed out waiting for socket state")
        .expect("socket state sender dropped");
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_topics_are_sent_and_events_delivered() {
    let (listener, url) = listener().await;
    let (_online_tx, online) = watch::channel(true);
    let latch = SessionExpiredLatch::new();

    let socket = EventSocket::spawn(
        url,
        fast_config(),
        CancellationToken::new(),
        SocketGates {
            online,
            latch: latch.clone(),
        },
        None,
    );
    socket.subscribe_topic("navigator").unwrap();
    let mut events = socket.subscribe();

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    let first = ws.next().await.unwrap().unwrap();
    let frame: serde_json::Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
    assert_eq!(frame["id"], "client_topic_subscribe");
    assert_eq!(frame["topicId"], "navigator");

    ws.send(Message::text(
        r#"{"id":"object_deleted","topicId":"navigator","nodePaths":["database://pg/public"]}"#,
    ))
    .await
    .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind(), Some(ServerEventId::ObjectDeleted));
    assert_eq!(event.payload["nodePaths"][0], "database://pg/public");

    socket.shutdown();
}

#[tokio::test]
async fn test_topics_replayed_after_reconnect() {
    let (listener, url) = listener().await;
    let (_online_tx, online) = watch::channel(true);

    let socket = EventSocket::spawn(
        url,
        fast_config(),
        CancellationToken::new(),
        SocketGates {
            online,
            latch: SessionExpiredLatch::new(),
        },
        None,
    );
    socket.subscribe_topic("config").unwrap();

    // First connection: read the subscription, then drop the socket.
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let first = ws.next().await.unwrap().unwrap();
    assert!(first.to_text().unwrap().contains("config"));
    drop(ws);

    // Second connection replays the remembered topic.
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let replay = ws.next().await.unwrap().unwrap();
    let frame: serde_json::Value = serde_json::from_str(replay.to_text().unwrap()).unwrap();
    assert_eq!(frame["id"], "client_topic_subscribe");
    assert_eq!(frame["topicId"], "config");

    socket.shutdown();
}

#[tokio::test]
async fn test_session_expired_event_parks_socket() {
    let (listener, url) = listener().await;
    let (_online_tx, online) = watch::channel(true);
    let latch = SessionExpiredLatch::new();

    let socket = EventSocket::spawn(
        url,
        fast_config(),
        CancellationToken::new(),
        SocketGates {
            online,
            latch: latch.clone(),
        },
        None,
    );
    let mut state = socket.state();

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    wait_for_state(&mut state, SocketState::Connected).await;

    ws.send(Message::text(r#"{"id":"session_expired"}"#))
        .await
        .unwrap();

    wait_for_state(&mut state, SocketState::SessionExpired).await;
    assert!(latch.is_tripped());

    // Clearing the latch lets the socket come back.
    latch.clear();
    let (stream, _) = listener.accept().await.unwrap();
    let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    wait_for_state(&mut state, SocketState::Connected).await;

    socket.shutdown();
}

#[tokio::test]
async fn test_offline_socket_does_not_connect() {
    let (listener, url) = listener().await;
    let (online_tx, online) = watch::channel(false);

    let socket = EventSocket::spawn(
        url,
        fast_config(),
        CancellationToken::new(),
        SocketGates {
            online,
            latch: SessionExpiredLatch::new(),
        },
        None,
    );
    let mut state = socket.state();
    wait_for_state(&mut state, SocketState::WaitingForNetwork).await;

    let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err(), "socket connected while offline");

    online_tx.send(true).unwrap();
    let (stream, _) = listener.accept().await.unwrap();
    let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    wait_for_state(&mut state, SocketState::Connected).await;

    socket.shutdown();
    wait_for_state(&mut state, SocketState::Closed).await;
}
