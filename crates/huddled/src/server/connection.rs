//! Connection handler for individual WebSocket clients.
//!
//! Each accepted TCP stream gets its own `ConnectionHandler` that:
//! - Completes the WebSocket handshake
//! - Registers with the coordinator and announces the connection ID
//! - Decodes inbound frames and routes them to the coordinator
//! - Drains the connection's outbox to the socket from a writer task
//! - Pings the client so a quiet call is told apart from a dead transport
//! - Reports the disconnect when the transport goes away
//!
//! # Liveness
//!
//! Silence alone never ends a connection. The writer pings every
//! `ping_interval`; any inbound frame (pongs included) counts as proof of
//! life. Only when nothing arrives for `ping_interval + pong_timeout` is the
//! transport treated as dead.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Malformed frames are logged and skipped; the connection stays open
//! - Transport errors on either half end the connection and always trigger departure

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use huddle_core::ConnectionId;
use huddle_protocol::{decode, Inbound, ServerEvent};

use crate::config::ServerConfig;
use crate::coordinator::{CoordinatorError, CoordinatorHandle};

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-connection limits taken from the server configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Largest accepted text frame in bytes
    pub max_message_bytes: usize,

    /// Interval between keepalive pings
    pub ping_interval: Duration,

    /// Grace period for the client to answer a ping
    pub pong_timeout: Duration,
}

impl ConnectionSettings {
    /// Longest a live client can go without sending us a frame.
    pub fn liveness_window(&self) -> Duration {
        self.ping_interval + self.pong_timeout
    }
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_message_bytes: config.max_message_bytes,
            ping_interval: config.ping_interval,
            pong_timeout: config.pong_timeout,
        }
    }
}

/// Connection handler for a single WebSocket client.
pub struct ConnectionHandler {
    /// Remote address, for logging
    peer: SocketAddr,

    /// Handle to the coordinator actor
    coordinator: CoordinatorHandle,

    settings: ConnectionSettings,

    /// Cancelled when the server shuts down
    cancel_token: CancellationToken,
}

impl ConnectionHandler {
    pub fn new(
        peer: SocketAddr,
        coordinator: CoordinatorHandle,
        settings: ConnectionSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            peer,
            coordinator,
            settings,
            cancel_token,
        }
    }

    /// Runs the connection handler over a freshly accepted TCP stream.
    pub async fn run(self, stream: TcpStream) -> Result<(), ConnectionError> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
        let (sink, source) = ws.split();
        self.serve(sink, source).await
    }

    /// Serves an already upgraded WebSocket split into its two halves.
    ///
    /// Returns when the client closes, either half of the transport fails,
    /// the client stops answering pings, or the server shuts down. A
    /// registered connection is always reported to the coordinator as
    /// disconnected before this returns.
    pub async fn serve<Si, St>(self, mut sink: Si, source: St) -> Result<(), ConnectionError>
    where
        Si: Sink<Message, Error = WsError> + Unpin + Send + 'static,
        St: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let connection_id = match self.coordinator.register(outbox.clone()).await {
            Ok(id) => id,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "Connection refused");
                let _ = timeout(WRITE_TIMEOUT, sink.send(Message::Close(None))).await;
                return Err(e.into());
            }
        };

        // Queued ahead of anything the coordinator can send
        let _ = outbox.send(ServerEvent::connected(connection_id.clone()));
        drop(outbox);

        info!(
            connection_id = %connection_id,
            peer = %self.peer,
            "Client connected"
        );

        let writer_done = CancellationToken::new();
        let writer = tokio::spawn(write_loop(
            connection_id.clone(),
            sink,
            inbox,
            self.settings.ping_interval,
            writer_done.clone(),
        ));

        let result = self.read_loop(&connection_id, source, &writer_done).await;
        match &result {
            Ok(()) => debug!(connection_id = %connection_id, "Read loop finished"),
            Err(e) => debug!(connection_id = %connection_id, error = %e, "Read loop ended with error"),
        }

        // The actor drops the outbox on unregister, which ends the writer
        self.coordinator.disconnect(connection_id.clone()).await;
        let _ = writer.await;

        info!(connection_id = %connection_id, "Client disconnected");
        result
    }

    async fn read_loop<St>(
        &self,
        connection_id: &ConnectionId,
        mut source: St,
        writer_done: &CancellationToken,
    ) -> Result<(), ConnectionError>
    where
        St: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        let window = self.settings.liveness_window();

        loop {
            let next = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!(connection_id = %connection_id, "Server shutting down");
                    return Ok(());
                }
                _ = writer_done.cancelled() => {
                    info!(connection_id = %connection_id, "Outbound half closed");
                    return Err(ConnectionError::WriterClosed);
                }
                next = timeout(window, source.next()) => next,
            };

            let frame = match next {
                Err(_) => {
                    info!(
                        connection_id = %connection_id,
                        window_ms = window.as_millis() as u64,
                        "No reply to keepalive ping"
                    );
                    return Err(ConnectionError::KeepaliveTimeout);
                }
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => return Err(ConnectionError::WebSocket(e.to_string())),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => self.handle_text(connection_id, &text).await?,
                Message::Close(_) => return Ok(()),
                Message::Binary(data) => {
                    warn!(
                        connection_id = %connection_id,
                        size = data.len(),
                        "Ignoring binary frame"
                    );
                }
                // Liveness only; ping replies are handled by the WebSocket layer
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Decodes one text frame and routes it to the coordinator.
    ///
    /// Only a stopped coordinator is fatal; everything else is logged.
    async fn handle_text(&self, connection_id: &ConnectionId, text: &str) -> Result<(), ConnectionError> {
        if text.len() > self.settings.max_message_bytes {
            let e = ConnectionError::MessageTooLarge {
                size: text.len(),
                max: self.settings.max_message_bytes,
            };
            warn!(connection_id = %connection_id, error = %e, "Rejected frame");
            return Ok(());
        }

        let inbound = match decode(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Rejected frame");
                return Ok(());
            }
        };

        let result = match inbound {
            Inbound::Join {
                session_id,
                identity,
            } => self
                .coordinator
                .join(connection_id.clone(), session_id, identity)
                .await
                .map(|_| ()),
            Inbound::Negotiate(request) => {
                debug!(
                    connection_id = %connection_id,
                    kind = %request.kind,
                    "Negotiation message received"
                );
                self.coordinator
                    .relay(connection_id.clone(), request)
                    .await
                    .map(|_| ())
            }
            Inbound::Leave { session_id } => self
                .coordinator
                .leave(connection_id.clone(), session_id)
                .await
                .map(|_| ()),
        };

        match result {
            Ok(()) => Ok(()),
            Err(CoordinatorError::ChannelClosed) => Err(CoordinatorError::ChannelClosed.into()),
            Err(e) => {
                // The coordinator already logged the rejection
                debug!(connection_id = %connection_id, error = %e, "Command not applied");
                Ok(())
            }
        }
    }
}

/// Drains a connection's outbox to the socket and pings on a fixed interval
/// until the outbox closes or a write fails.
///
/// `done` is cancelled on every exit so the read half can follow.
async fn write_loop<Si>(
    connection_id: ConnectionId,
    mut sink: Si,
    mut inbox: mpsc::UnboundedReceiver<ServerEvent>,
    ping_interval: Duration,
    done: CancellationToken,
) where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    let _done = done.drop_guard();
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let message = tokio::select! {
            event = inbox.recv() => match event {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to serialize event");
                        continue;
                    }
                },
                None => break,
            },
            _ = ping.tick() => Message::Ping(Vec::new()),
        };

        match timeout(WRITE_TIMEOUT, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection_id = %connection_id, error = %e, "Write failed");
                return;
            }
            Err(_) => {
                warn!(connection_id = %connection_id, "Write timeout");
                return;
            }
        }
    }

    let _ = timeout(WRITE_TIMEOUT, sink.close()).await;
}

/// Errors that end a client connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Keepalive timeout: no frame received within the ping window")]
    KeepaliveTimeout,

    #[error("Outbound half of the connection closed")]
    WriterClosed,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorLimits;
    use crate::coordinator::spawn_coordinator;
    use crate::registry::RegistryError;
    use huddle_core::{Identity, NegotiationKind, SessionId, UserId};
    use huddle_protocol::{ClientEvent, NegotiationRequest, Route};
    use serde_json::json;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            max_message_bytes: 4096,
            ping_interval: Duration::from_secs(60),
            pong_timeout: Duration::from_secs(60),
        }
    }

    fn handler(coordinator: CoordinatorHandle) -> ConnectionHandler {
        ConnectionHandler::new(
            SocketAddr::from(([127, 0, 0, 1], 40000)),
            coordinator,
            settings(),
            CancellationToken::new(),
        )
    }

    /// Inbound frames fed from a channel; pending while the sender is alive.
    fn frames(
        rx: mpsc::UnboundedReceiver<Message>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (Ok(message), rx))
        }))
    }

    /// A sink that accepts `limit` messages and fails every write after that.
    fn failing_after(limit: usize) -> impl Sink<Message, Error = WsError> + Unpin + Send + 'static {
        Box::pin(futures_util::sink::unfold(0usize, move |sent, _message: Message| async move {
            if sent < limit {
                Ok(sent + 1)
            } else {
                Err(WsError::ConnectionClosed)
            }
        }))
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("outbox closed")
    }

    #[test]
    fn test_settings_from_config() {
        let config = ServerConfig {
            max_message_bytes: 512,
            ping_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(3),
            ..ServerConfig::default()
        };

        let settings = ConnectionSettings::from(&config);
        assert_eq!(settings.max_message_bytes, 512);
        assert_eq!(settings.ping_interval, Duration::from_secs(5));
        assert_eq!(settings.liveness_window(), Duration::from_secs(8));
    }

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::MessageTooLarge { size: 10, max: 5 };
        assert_eq!(err.to_string(), "Message too large: 10 bytes (max: 5)");

        let err = ConnectionError::from(CoordinatorError::from(RegistryError::ConnectionLimit {
            max: 2,
        }));
        assert_eq!(
            err.to_string(),
            "Coordinator error: connection limit reached (max: 2 connections)"
        );

        assert_eq!(
            ConnectionError::WriterClosed.to_string(),
            "Outbound half of the connection closed"
        );
    }

    #[tokio::test]
    async fn test_failed_write_departs_member() {
        let coordinator = spawn_coordinator(CoordinatorLimits::default());
        let s1 = SessionId::new("s1");

        // Bob is already in the room
        let (bob_outbox, mut bob_rx) = mpsc::unbounded_channel();
        let bob = coordinator.register(bob_outbox).await.unwrap();
        coordinator
            .join(bob.clone(), s1.clone(), Identity::new(UserId::new("bob"), "Bob"))
            .await
            .unwrap();
        let _ = next_event(&mut bob_rx).await; // existing-members
        let _ = next_event(&mut bob_rx).await; // join-ack

        // connected, existing-members and join-ack go out; the next write fails
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(handler(coordinator.clone()).serve(failing_after(3), frames(frame_rx)));

        let join = serde_json::to_string(&ClientEvent::join_room("s1", "alice", "Alice")).unwrap();
        frame_tx.send(Message::Text(join)).unwrap();

        let alice = match next_event(&mut bob_rx).await {
            ServerEvent::MemberJoined(participant) => participant,
            other => panic!("expected member-joined, got {other:?}"),
        };

        coordinator
            .relay(
                bob.clone(),
                NegotiationRequest {
                    kind: NegotiationKind::Offer,
                    route: Route::Direct(alice.connection_id.clone()),
                    session_id: s1.clone(),
                    payload: json!({"sdp": "v=0"}),
                },
            )
            .await
            .unwrap();

        let result = timeout(Duration::from_secs(2), task)
            .await
            .expect("handler kept running after its writer failed")
            .unwrap();
        assert!(matches!(result, Err(ConnectionError::WriterClosed)));

        // The client's read half is still open, yet the member is gone
        assert_eq!(next_event(&mut bob_rx).await, ServerEvent::member_left(alice));
        assert_eq!(coordinator.room_members(s1).await.len(), 1);
        assert_eq!(coordinator.stats().await.unwrap().connections, 1);
        drop(frame_tx);
    }

    #[tokio::test]
    async fn test_quiet_client_answering_pings_stays_connected() {
        let coordinator = spawn_coordinator(CoordinatorLimits::default());
        let mut handler = handler(coordinator.clone());
        handler.settings.ping_interval = Duration::from_millis(50);
        handler.settings.pong_timeout = Duration::from_millis(50);

        // Answer every ping with a pong, as a browser does
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let pong_tx = frame_tx.clone();
        let sink = Box::pin(futures_util::sink::unfold((), move |(), message: Message| {
            let pong_tx = pong_tx.clone();
            async move {
                if let Message::Ping(data) = message {
                    let _ = pong_tx.send(Message::Pong(data));
                }
                Ok::<(), WsError>(())
            }
        }));
        let task = tokio::spawn(handler.serve(sink, frames(frame_rx)));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!task.is_finished(), "quiet client was disconnected");
        assert_eq!(coordinator.stats().await.unwrap().connections, 1);

        frame_tx.send(Message::Close(None)).unwrap();
        let result = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert_eq!(coordinator.stats().await.unwrap().connections, 0);
    }

    #[tokio::test]
    async fn test_unanswered_pings_end_connection() {
        let coordinator = spawn_coordinator(CoordinatorLimits::default());
        let mut handler = handler(coordinator.clone());
        handler.settings.ping_interval = Duration::from_millis(50);
        handler.settings.pong_timeout = Duration::from_millis(50);

        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Message>();
        let sink = futures_util::sink::drain()
            .sink_map_err(|never: std::convert::Infallible| -> WsError { match never {} });
        let result = timeout(Duration::from_secs(2), handler.serve(sink, frames(frame_rx)))
            .await
            .expect("dead transport was never detected");

        assert!(matches!(result, Err(ConnectionError::KeepaliveTimeout)));
        assert_eq!(coordinator.stats().await.unwrap().connections, 0);
        drop(frame_tx);
    }
}
