//! Participant identity and per-connection lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ConnectionId, UserId};

/// Identity claims a client announces when joining.
///
/// Not authenticated: callers upstream are expected to present
/// pre-validated identities if trust matters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub user_id: UserId,
    pub user_name: String,
}

impl Identity {
    pub fn new(user_id: UserId, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
        }
    }
}

/// A room member as seen by other clients.
///
/// This is the `{userId, userName, connectionId}` triple carried by
/// `existing-members`, `member-joined`, and `member-left`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: UserId,
    pub user_name: String,
    pub connection_id: ConnectionId,
}

impl Participant {
    /// Builds the public view of a connection with the given identity.
    pub fn from_identity(connection_id: ConnectionId, identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            user_name: identity.user_name.clone(),
            connection_id,
        }
    }
}

/// Lifecycle state of a connection.
///
/// ```text
/// Connected ──join──▶ Joined ──leave──▶ Announced ──join──▶ Joined
///     │                  │                  │
///     └──────────────────┴──── close ───────┴──▶ Closed
/// ```
///
/// `Announced` is reached when identity is attached but the connection is not
/// in a room, which only happens after an explicit leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Transport registered, no identity yet
    Connected,

    /// Identity attached, not in a room
    Announced,

    /// Member of exactly one room
    Joined,

    /// Transport closed; terminal
    Closed,
}

impl ConnectionState {
    /// Derives the state from what the registry knows about a connection.
    pub fn derive(has_identity: bool, in_room: bool) -> Self {
        match (has_identity, in_room) {
            (_, true) => Self::Joined,
            (true, false) => Self::Announced,
            (false, false) => Self::Connected,
        }
    }

    /// Returns true if the connection may still send and receive events.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connected => "connected",
            Self::Announced => "announced",
            Self::Joined => "joined",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}
