//! Client interface for interacting with the CoordinatorActor.
//!
//! The `CoordinatorHandle` provides a cheap-to-clone interface for sending
//! commands to the coordinator actor and subscribing to room events.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `CoordinatorError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use huddle_core::{ConnectionId, Identity, Participant, SessionId};
use huddle_protocol::NegotiationRequest;

use super::commands::{
    CoordinatorCommand, CoordinatorError, CoordinatorStats, JoinOutcome, RelayOutcome, RoomEvent,
};
use crate::registry::Outbox;

// ============================================================================
// Coordinator Handle
// ============================================================================

/// Handle for interacting with the coordinator actor.
///
/// This is a cheap-to-clone handle that can be shared across connection
/// tasks. Client notifications never come back through the handle: they
/// arrive on the outbox passed to [`register`](Self::register).
///
/// # Usage
///
/// ```ignore
/// let (outbox, mut inbox) = mpsc::unbounded_channel();
/// let connection_id = handle.register(outbox).await?;
///
/// handle.join(connection_id.clone(), session_id, identity).await?;
///
/// while let Some(event) = inbox.recv().await {
///     // Write event to the transport
/// }
///
/// handle.disconnect(connection_id).await;
/// ```
#[derive(Clone)]
pub struct CoordinatorHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<CoordinatorCommand>,

    /// Event broadcaster for subscribing to room events
    event_sender: broadcast::Sender<RoomEvent>,
}

impl CoordinatorHandle {
    /// Create a new coordinator handle.
    pub fn new(
        sender: mpsc::Sender<CoordinatorCommand>,
        event_sender: broadcast::Sender<RoomEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Register a freshly accepted transport.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::Registry(ConnectionLimit)` if at maximum capacity
    /// - `CoordinatorError::ChannelClosed` if the actor has shut down
    pub async fn register(&self, outbox: Outbox) -> Result<ConnectionId, CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::Register {
                outbox,
                respond_to: tx,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Announce identity and join a session's room.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::UnknownConnection` if the connection is not registered
    /// - `CoordinatorError::Registry(RoomFull)` if the room is at maximum size
    /// - `CoordinatorError::ChannelClosed` if the actor has shut down
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        identity: Identity,
    ) -> Result<JoinOutcome, CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::Join {
                connection_id,
                session_id,
                identity,
                respond_to: tx,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Relay a negotiation message.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::ChannelClosed` if the actor has shut down
    pub async fn relay(
        &self,
        sender: ConnectionId,
        request: NegotiationRequest,
    ) -> Result<RelayOutcome, CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::Relay {
                sender,
                request,
                respond_to: tx,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Leave a room. Returns true if the connection was in that room.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::ChannelClosed` if the actor has shut down
    pub async fn leave(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
    ) -> Result<bool, CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::Leave {
                connection_id,
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Tell the coordinator a transport has closed.
    ///
    /// Fire-and-forget; if the actor is already gone there is nothing to
    /// clean up.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let _ = self
            .sender
            .send(CoordinatorCommand::Disconnect { connection_id })
            .await;
    }

    /// Get the current members of a room, ordered by arrival.
    ///
    /// Returns an empty list if the actor has shut down.
    pub async fn room_members(&self, session_id: SessionId) -> Vec<Participant> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(CoordinatorCommand::RoomMembers {
                session_id,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Get coordinator-wide counters.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::ChannelClosed` if the actor has shut down
    pub async fn stats(&self) -> Result<CoordinatorStats, CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::Stats { respond_to: tx })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Subscribe to room lifecycle events.
    ///
    /// Returns a broadcast receiver that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.event_sender.subscribe()
    }
}
