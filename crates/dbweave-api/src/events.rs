//! Server event socket with gated, fixed-interval reconnect.
//!
//! Connects to the server's JSON-framed WebSocket endpoint and streams
//! parsed [`ServerEvent`]s through a [`tokio::sync::broadcast`] channel.
//! Topics are multiplexed over the single socket: the client sends
//! `client_topic_subscribe` / `client_topic_unsubscribe` frames, and the set
//! of subscribed topics is replayed after every reconnect.
//!
//! Reconnects happen on a fixed timer, but only while the network is
//! reported online and the [`SessionExpiredLatch`] is open. A
//! `session_expired` event trips the latch and parks the socket until the
//! latch is cleared.
//!
//! # Example
//!
//! ```rust,ignore
//! use dbweave_api::events::{EventSocket, EventSocketConfig, SocketGates};
//!
//! let socket = EventSocket::spawn(ws_url, EventSocketConfig::default(), cancel, gates, cookie);
//! socket.subscribe_topic("navigator")?;
//! let mut rx = socket.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     println!("{}", event.id);
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::latch::SessionExpiredLatch;

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Event identifiers ────────────────────────────────────────────────

/// Event ids the server pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ServerEventId {
    SessionWebsocketConnected,
    SessionState,
    SessionExpired,
    ConfigChanged,
    SubjectPermissionsUpdated,
    UserDeleted,
    ObjectCreated,
    ObjectUpdated,
    ObjectDeleted,
    DatasourceCreated,
    DatasourceUpdated,
    DatasourceDeleted,
}

/// Topics a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ServerEventTopic {
    Session,
    Config,
    Permissions,
    Navigator,
    Datasource,
}

// ── Wire frames ──────────────────────────────────────────────────────

/// A parsed event from the server socket.
///
/// Uses `#[serde(flatten)]` to capture every field beyond `id` and
/// `topicId`, so event-specific payloads are never silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    /// Event id, e.g. `"object_deleted"`.
    pub id: String,

    /// Topic the event was published on.
    #[serde(default)]
    pub topic_id: Option<String>,

    /// All remaining fields the server sends.
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

impl ServerEvent {
    /// The typed event id, `None` for ids this client does not know.
    pub fn kind(&self) -> Option<ServerEventId> {
        self.id.parse().ok()
    }
}

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "id")]
pub enum ClientMessage {
    #[serde(rename = "client_topic_subscribe")]
    TopicSubscribe {
        #[serde(rename = "topicId")]
        topic_id: String,
    },
    #[serde(rename = "client_topic_unsubscribe")]
    TopicUnsubscribe {
        #[serde(rename = "topicId")]
        topic_id: String,
    },
    #[serde(rename = "client_session_ping")]
    SessionPing,
}

impl ClientMessage {
    fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Deserialization {
            message: format!("failed to encode client frame: {e}"),
            body: String::new(),
        })
    }
}

// ── Configuration / state ────────────────────────────────────────────

/// Reconnect and keep-alive timing.
#[derive(Debug, Clone)]
pub struct EventSocketConfig {
    /// Fixed delay between reconnect attempts. Default: 5s.
    pub reconnect_interval: Duration,

    /// Interval between keep-alive pings on an open socket. Default: 30s.
    pub keep_alive_interval: Duration,
}

impl Default for EventSocketConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            keep_alive_interval: Duration::from_secs(30),
        }
    }
}

/// Conditions that must hold before the socket attempts to connect.
#[derive(Debug, Clone)]
pub struct SocketGates {
    /// Network-online flag; `false` parks the socket.
    pub online: watch::Receiver<bool>,
    /// Session-expired latch; tripped parks the socket.
    pub latch: SessionExpiredLatch,
}

/// Observable socket lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Disconnected,
    WaitingForNetwork,
    SessionExpired,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Closed,
}

// ── EventSocket ──────────────────────────────────────────────────────

/// Handle to a running event socket.
///
/// Call [`shutdown`](Self::shutdown) to tear down the background task.
pub struct EventSocket {
    event_tx: broadcast::Sender<Arc<ServerEvent>>,
    command_tx: mpsc::UnboundedSender<ClientMessage>,
    state: watch::Receiver<SocketState>,
    cancel: CancellationToken,
}

impl EventSocket {
    /// Spawn the socket loop. Must be called from within a Tokio runtime.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background once the gates allow it.
    pub fn spawn(
        ws_url: Url,
        config: EventSocketConfig,
        cancel: CancellationToken,
        gates: SocketGates,
        cookie: Option<String>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SocketState::Disconnected);

        let ctx = LoopContext {
            url: ws_url,
            config,
            cancel: cancel.clone(),
            gates,
            cookie,
            event_tx: event_tx.clone(),
            state: state_tx,
        };
        tokio::spawn(socket_loop(ctx, command_rx));

        Self {
            event_tx,
            command_tx,
            state,
            cancel,
        }
    }

    /// Get a new receiver for the event stream.
    ///
    /// If a consumer falls behind it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ServerEvent>> {
        self.event_tx.subscribe()
    }

    /// Subscribe the socket to a topic. Remembered across reconnects.
    pub fn subscribe_topic(&self, topic: impl Into<String>) -> Result<(), Error> {
        self.command_tx
            .send(ClientMessage::TopicSubscribe {
                topic_id: topic.into(),
            })
            .map_err(|_| Error::WebSocketClosed)
    }

    /// Drop a topic subscription.
    pub fn unsubscribe_topic(&self, topic: impl Into<String>) -> Result<(), Error> {
        self.command_tx
            .send(ClientMessage::TopicUnsubscribe {
                topic_id: topic.into(),
            })
            .map_err(|_| Error::WebSocketClosed)
    }

    /// Watch the socket lifecycle.
    pub fn state(&self) -> watch::Receiver<SocketState> {
        self.state.clone()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background loop ──────────────────────────────────────────────────

struct LoopContext {
    url: Url,
    config: EventSocketConfig,
    cancel: CancellationToken,
    gates: SocketGates,
    cookie: Option<String>,
    event_tx: broadcast::Sender<Arc<ServerEvent>>,
    state: watch::Sender<SocketState>,
}

/// Main loop: wait for gates → connect → read → fixed delay → repeat.
async fn socket_loop(mut ctx: LoopContext, mut commands: mpsc::UnboundedReceiver<ClientMessage>) {
    let mut topics: BTreeSet<String> = BTreeSet::new();
    let mut attempt: u32 = 0;

    loop {
        if !wait_for_gates(&mut ctx).await {
            break;
        }

        let _ = ctx.state.send(SocketState::Connecting);
        match connect_and_read(&mut ctx, &mut topics, &mut commands).await {
            Ok(()) => {
                info!("event socket disconnected");
                attempt = 0;
            }
            Err(e) => {
                warn!(error = %e, attempt, "event socket error");
                attempt = attempt.saturating_add(1);
            }
        }

        if ctx.cancel.is_cancelled() {
            break;
        }

        let _ = ctx.state.send(SocketState::Reconnecting { attempt });
        debug!(
            delay_ms = u64::try_from(ctx.config.reconnect_interval.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            () = tokio::time::sleep(ctx.config.reconnect_interval) => {}
        }
    }

    let _ = ctx.state.send(SocketState::Closed);
    debug!("event socket loop exiting");
}

/// Park until the network is online and the session latch is open.
///
/// Returns `false` if cancelled while waiting.
async fn wait_for_gates(ctx: &mut LoopContext) -> bool {
    let mut expired = ctx.gates.latch.subscribe();

    loop {
        let online = *ctx.gates.online.borrow_and_update();
        let session_expired = *expired.borrow_and_update();

        if online && !session_expired {
            return true;
        }

        let parked = if session_expired {
            SocketState::SessionExpired
        } else {
            SocketState::WaitingForNetwork
        };
        let _ = ctx.state.send(parked);
        debug!(?parked, "event socket parked");

        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return false,
            Ok(()) = ctx.gates.online.changed() => {}
            Ok(()) = expired.changed() => {}
        }
    }
}

/// Apply a topic command to the remembered topic set.
fn apply_command(topics: &mut BTreeSet<String>, command: &ClientMessage) {
    match command {
        ClientMessage::TopicSubscribe { topic_id } => {
            topics.insert(topic_id.clone());
        }
        ClientMessage::TopicUnsubscribe { topic_id } => {
            topics.remove(topic_id);
        }
        ClientMessage::SessionPing => {}
    }
}

/// Establish a single connection and pump frames until it drops.
#[allow(clippy::too_many_lines)]
async fn connect_and_read(
    ctx: &mut LoopContext,
    topics: &mut BTreeSet<String>,
    commands: &mut mpsc::UnboundedReceiver<ClientMessage>,
) -> Result<(), Error> {
    info!(url = %ctx.url, "connecting event socket");

    let uri: tungstenite::http::Uri = ctx
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(ref cookie) = ctx.cookie {
        request = request.with_header("Cookie", cookie.clone());
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    // Commands queued while disconnected only need to reach the topic set;
    // the replay below sends the result.
    while let Ok(command) = commands.try_recv() {
        apply_command(topics, &command);
    }
    for topic in topics.iter() {
        let frame = ClientMessage::TopicSubscribe {
            topic_id: topic.clone(),
        }
        .encode()?;
        write
            .send(tungstenite::Message::text(frame))
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
    }

    let _ = ctx.state.send(SocketState::Connected);
    info!(topics = topics.len(), "event socket connected");

    let mut keep_alive = tokio::time::interval(ctx.config.keep_alive_interval);
    keep_alive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    keep_alive.tick().await;

    loop {
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                let _ = write.close().await;
                return Ok(());
            }
            Ok(()) = ctx.gates.online.changed() => {
                if !*ctx.gates.online.borrow() {
                    info!("network offline, dropping event socket");
                    let _ = write.close().await;
                    return Ok(());
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    // Every handle is gone; nobody is listening any more.
                    ctx.cancel.cancel();
                    let _ = write.close().await;
                    return Ok(());
                };
                apply_command(topics, &command);
                write
                    .send(tungstenite::Message::text(command.encode()?))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            _ = keep_alive.tick() => {
                trace!("event socket keep-alive");
                write
                    .send(tungstenite::Message::text(ClientMessage::SessionPing.encode()?))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if handle_text(&text, &ctx.event_tx, &ctx.gates.latch) {
                            let _ = write.close().await;
                            return Ok(());
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            info!(code = %cf.code, reason = %cf.reason, "event socket close frame received");
                        } else {
                            info!("event socket close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        info!("event socket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Ping, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Parse a text frame and broadcast the event inside.
///
/// Returns `true` when the event expired the session and the socket must
/// park.
fn handle_text(
    text: &str,
    event_tx: &broadcast::Sender<Arc<ServerEvent>>,
    latch: &SessionExpiredLatch,
) -> bool {
    let event: ServerEvent = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            debug!(error = %e, "failed to parse server event frame");
            return false;
        }
    };

    trace!(id = %event.id, topic = ?event.topic_id, "server event");
    let expired = event.kind() == Some(ServerEventId::SessionExpired);

    // Ignore send errors -- just means no active subscribers right now
    let _ = event_tx.send(Arc::new(event));

    if expired {
        latch.trip();
    }
    expired
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EventSocketConfig::default();
        assert_eq!(config.reconnect_interval, Duration::from_secs(5));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(30));
    }

    #[test]
    fn event_ids_round_trip_through_strum() {
        assert_eq!(ServerEventId::ObjectDeleted.as_ref(), "object_deleted");
        assert_eq!(
            "subject_permissions_updated".parse::<ServerEventId>().unwrap(),
            ServerEventId::SubjectPermissionsUpdated
        );
        assert_eq!(ServerEventTopic::Navigator.to_string(), "navigator");
    }

    #[test]
    fn subscribe_frame_encoding() {
        let frame = ClientMessage::TopicSubscribe {
            topic_id: "config".into(),
        };
        insta::assert_json_snapshot!(frame, @r###"
        {
          "id": "client_topic_subscribe",
          "topicId": "config"
        }
        "###);
    }

    #[test]
    fn ping_frame_encoding() {
        let encoded = ClientMessage::SessionPing.encode().unwrap();
        assert_eq!(encoded, r#"{"id":"client_session_ping"}"#);
    }

    #[test]
    fn deserialize_server_event_keeps_payload() {
        let json = r#"{
            "id": "object_deleted",
            "topicId": "navigator",
            "nodePaths": ["database://pg/public/users"]
        }"#;

        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), Some(ServerEventId::ObjectDeleted));
        assert_eq!(event.topic_id.as_deref(), Some("navigator"));
        assert_eq!(event.payload["nodePaths"][0], "database://pg/public/users");
    }

    #[test]
    fn unknown_event_id_has_no_kind() {
        let event: ServerEvent = serde_json::from_str(r#"{"id":"something_new"}"#).unwrap();
        assert!(event.kind().is_none());
    }

    #[test]
    fn topic_commands_update_set() {
        let mut topics = BTreeSet::new();
        apply_command(
            &mut topics,
            &ClientMessage::TopicSubscribe {
                topic_id: "config".into(),
            },
        );
        apply_command(
            &mut topics,
            &ClientMessage::TopicSubscribe {
                topic_id: "navigator".into(),
            },
        );
        apply_command(
            &mut topics,
            &ClientMessage::TopicUnsubscribe {
                topic_id: "config".into(),
            },
        );
        apply_command(&mut topics, &ClientMessage::SessionPing);
        assert_eq!(topics.into_iter().collect::<Vec<_>>(), vec!["navigator"]);
    }

    #[test]
    fn session_expired_event_trips_latch() {
        let (tx, mut rx) = broadcast::channel(16);
        let latch = SessionExpiredLatch::new();

        let parked = handle_text(r#"{"id":"session_expired"}"#, &tx, &latch);

        assert!(parked);
        assert!(latch.is_tripped());
        assert_eq!(rx.try_recv().unwrap().id, "session_expired");
    }

    #[test]
    fn malformed_frame_is_skipped() {
        let (tx, mut rx) = broadcast::channel::<Arc<ServerEvent>>(16);
        let latch = SessionExpiredLatch::new();

        assert!(!handle_text("not json at all", &tx, &latch));
        assert!(rx.try_recv().is_err());
        assert!(!latch.is_tripped());
    }

    #[tokio::test]
    async fn gates_hold_until_online() {
        let (online_tx, online) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(4);
        let (state_tx, mut state) = watch::channel(SocketState::Disconnected);
        let mut ctx = LoopContext {
            url: Url::parse("ws://127.0.0.1:1/events").unwrap(),
            config: EventSocketConfig::default(),
            cancel: CancellationToken::new(),
            gates: SocketGates {
                online,
                latch: SessionExpiredLatch::new(),
            },
            cookie: None,
            event_tx,
            state: state_tx,
        };

        let waiter = tokio::spawn(async move { wait_for_gates(&mut ctx).await });
        state
            .wait_for(|s| *s == SocketState::WaitingForNetwork)
            .await
            .unwrap();
        assert!(!waiter.is_finished());

        online_tx.send(true).unwrap();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn gates_release_on_cancel() {
        let (_online_tx, online) = watch::channel(true);
        let latch = SessionExpiredLatch::new();
        latch.trip();
        let (event_tx, _) = broadcast::channel(4);
        let (state_tx, _state) = watch::channel(SocketState::Disconnected);
        let cancel = CancellationToken::new();
        let mut ctx = LoopContext {
            url: Url::parse("ws://127.0.0.1:1/events").unwrap(),
            config: EventSocketConfig::default(),
            cancel: cancel.clone(),
            gates: SocketGates { online, latch },
            cookie: None,
            event_tx,
            state: state_tx,
        };

        cancel.cancel();
        assert!(!wait_for_gates(&mut ctx).await);
    }
}
