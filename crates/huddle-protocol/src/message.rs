//! Wire event types for signaling clients.
//!
//! Every frame is a JSON object whose `type` field names the event; the
//! remaining fields are camelCase.

use huddle_core::{ConnectionId, NegotiationKind, Participant, SessionId, UserId};
use serde::{Deserialize, Serialize};

/// Events sent by browser clients to the coordinator.
///
/// The three `send-*` events carry an optional `targetConnectionId`. Legacy
/// clients omit it, which selects the room-broadcast fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Announce identity and join the room for a session
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        session_id: String,
        user_id: String,
        user_name: String,
    },

    /// Session description offer for one peer
    #[serde(rename_all = "camelCase")]
    SendOffer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_connection_id: Option<String>,
        session_id: String,
        offer: serde_json::Value,
    },

    /// Session description answer for one peer
    #[serde(rename_all = "camelCase")]
    SendAnswer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_connection_id: Option<String>,
        session_id: String,
        answer: serde_json::Value,
    },

    /// Network-path candidate for one peer
    #[serde(rename_all = "camelCase")]
    SendCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_connection_id: Option<String>,
        session_id: String,
        candidate: serde_json::Value,
    },

    /// Leave the room for a session without closing the transport
    #[serde(rename_all = "camelCase")]
    LeaveRoom { session_id: String },
}

impl ClientEvent {
    /// Creates a join-room event.
    pub fn join_room(session_id: &str, user_id: &str, user_name: &str) -> Self {
        Self::JoinRoom {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
        }
    }

    /// Creates a negotiation event of the given kind.
    ///
    /// Passing `None` as the target produces the legacy broadcast form.
    pub fn negotiation(
        kind: NegotiationKind,
        target: Option<&ConnectionId>,
        session_id: &str,
        payload: serde_json::Value,
    ) -> Self {
        let target_connection_id = target.map(|t| t.as_str().to_string());
        let session_id = session_id.to_string();
        match kind {
            NegotiationKind::Offer => Self::SendOffer {
                target_connection_id,
                session_id,
                offer: payload,
            },
            NegotiationKind::Answer => Self::SendAnswer {
                target_connection_id,
                session_id,
                answer: payload,
            },
            NegotiationKind::Candidate => Self::SendCandidate {
                target_connection_id,
                session_id,
                candidate: payload,
            },
        }
    }

    /// Creates a leave-room event.
    pub fn leave_room(session_id: &str) -> Self {
        Self::LeaveRoom {
            session_id: session_id.to_string(),
        }
    }
}

/// Body of a relayed `offer`, `answer`, or `candidate` event.
///
/// Sender fields come from the coordinator's registry, never from the
/// sender's message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedNegotiation {
    pub payload: serde_json::Value,
    pub from_connection_id: ConnectionId,
    pub from_user_id: UserId,
    pub from_user_name: String,
    pub session_id: SessionId,
}

/// Events sent by the coordinator to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Transport accepted; tells the client its own connection ID
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },

    /// Members already in the room (sent only to the joiner)
    ExistingMembers { members: Vec<Participant> },

    /// A new member joined (sent to prior members)
    MemberJoined(Participant),

    /// Join acknowledgement (sent to the joiner)
    #[serde(rename_all = "camelCase")]
    JoinAck {
        room_name: String,
        session_id: SessionId,
        member_count: usize,
    },

    /// Relayed offer
    Offer(RelayedNegotiation),

    /// Relayed answer
    Answer(RelayedNegotiation),

    /// Relayed candidate
    Candidate(RelayedNegotiation),

    /// A member left or disconnected (sent to remaining members)
    MemberLeft(Participant),
}

impl ServerEvent {
    /// Creates a connected notification.
    pub fn connected(connection_id: ConnectionId) -> Self {
        Self::Connected { connection_id }
    }

    /// Creates an existing-members list.
    pub fn existing_members(members: Vec<Participant>) -> Self {
        Self::ExistingMembers { members }
    }

    /// Creates a member-joined notification.
    pub fn member_joined(participant: Participant) -> Self {
        Self::MemberJoined(participant)
    }

    /// Creates a join acknowledgement for the given room.
    pub fn join_ack(session_id: SessionId, member_count: usize) -> Self {
        Self::JoinAck {
            room_name: session_id.room_name(),
            session_id,
            member_count,
        }
    }

    /// Creates a relayed negotiation event of the given kind.
    pub fn negotiation(kind: NegotiationKind, body: RelayedNegotiation) -> Self {
        match kind {
            NegotiationKind::Offer => Self::Offer(body),
            NegotiationKind::Answer => Self::Answer(body),
            NegotiationKind::Candidate => Self::Candidate(body),
        }
    }

    /// Creates a member-left notification.
    pub fn member_left(participant: Participant) -> Self {
        Self::MemberLeft(participant)
    }

    /// Returns the kind and body if this is a relayed negotiation event.
    pub fn as_negotiation(&self) -> Option<(NegotiationKind, &RelayedNegotiation)> {
        match self {
            Self::Offer(body) => Some((NegotiationKind::Offer, body)),
            Self::Answer(body) => Some((NegotiationKind::Answer, body)),
            Self::Candidate(body) => Some((NegotiationKind::Candidate, body)),
            _ => None,
        }
    }
}
