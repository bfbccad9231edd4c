//! Coordinator actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the
//! `CoordinatorActor`:
//! - `CoordinatorCommand`: Commands sent to the actor
//! - `CoordinatorError`: Errors that can occur during coordinator operations
//! - `RoomEvent`: Room lifecycle events published for subscribers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use huddle_core::{ConnectionId, Identity, Participant, SessionId};
use huddle_protocol::NegotiationRequest;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::registry::{Outbox, RegistryError};

// ============================================================================
// Coordinator Commands
// ============================================================================

/// Commands sent to the coordinator actor.
///
/// Request/response commands carry a oneshot channel for the reply.
/// Notifications to clients are never returned here: the actor pushes them
/// into the affected connections' outboxes while processing the command.
#[derive(Debug)]
pub enum CoordinatorCommand {
    /// Register a newly accepted transport.
    ///
    /// # Errors
    /// - `CoordinatorError::Registry(ConnectionLimit)` if at maximum capacity
    Register {
        /// Outbound mailbox for events addressed to this connection
        outbox: Outbox,
        respond_to: oneshot::Sender<Result<ConnectionId, CoordinatorError>>,
    },

    /// Announce identity and join a session's room.
    ///
    /// # Errors
    /// - `CoordinatorError::UnknownConnection` if the connection is not registered
    /// - `CoordinatorError::Registry(RoomFull)` if the room is at maximum size
    Join {
        connection_id: ConnectionId,
        session_id: SessionId,
        identity: Identity,
        respond_to: oneshot::Sender<Result<JoinOutcome, CoordinatorError>>,
    },

    /// Relay a negotiation message from one connection.
    Relay {
        sender: ConnectionId,
        request: NegotiationRequest,
        respond_to: oneshot::Sender<RelayOutcome>,
    },

    /// Leave a room without closing the transport.
    ///
    /// Responds with true if the connection actually left a room.
    Leave {
        connection_id: ConnectionId,
        session_id: SessionId,
        respond_to: oneshot::Sender<bool>,
    },

    /// The transport closed; drop all state for the connection.
    ///
    /// Fire-and-forget: sent from connection teardown paths.
    Disconnect { connection_id: ConnectionId },

    /// Get the current members of a room.
    RoomMembers {
        session_id: SessionId,
        respond_to: oneshot::Sender<Vec<Participant>>,
    },

    /// Get coordinator-wide counters.
    Stats {
        respond_to: oneshot::Sender<CoordinatorStats>,
    },
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Members that were already present (what `existing-members` carried)
    pub existing_members: Vec<Participant>,

    /// Room size after the join
    pub member_count: usize,

    /// True if the connection was already in this room
    pub rejoined: bool,
}

/// Result of a relay request.
///
/// Only used internally and by tests; the sending client never learns
/// whether its message was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Delivered to this many connections
    Delivered { recipients: usize },

    /// Nobody to deliver to (target gone, sender gone, or empty room)
    Dropped,
}

/// Coordinator-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Live connections
    pub connections: usize,

    /// Open rooms
    pub rooms: usize,

    /// Connections currently in a room
    pub joined: usize,
}

// ============================================================================
// Coordinator Errors
// ============================================================================

/// Errors that can occur during coordinator operations.
#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    /// A capacity limit would be exceeded.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The connection is not (or no longer) registered.
    #[error("connection not registered: {0}")]
    UnknownConnection(ConnectionId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Room Events
// ============================================================================

/// Room lifecycle events published by the coordinator.
///
/// An embedding server subscribes to these to learn when a call has ended
/// (`Closed`) without polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// The first member joined a session.
    Opened { session_id: SessionId },

    /// A member joined an open room.
    MemberJoined {
        session_id: SessionId,
        participant: Participant,
    },

    /// A member left the room.
    MemberLeft {
        session_id: SessionId,
        participant: Participant,
        reason: DepartureReason,
    },

    /// The last member left; the room no longer exists.
    Closed {
        session_id: SessionId,
        open_for: chrono::Duration,
    },
}

/// Why a member left its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureReason {
    /// Client sent leave-room.
    Left,

    /// Transport closed (gracefully or not).
    Disconnected,

    /// Client joined a different session.
    SwitchedRoom,
}

impl std::fmt::Display for DepartureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "left the room"),
            Self::Disconnected => write!(f, "transport closed"),
            Self::SwitchedRoom => write!(f, "joined another room"),
        }
    }
}
