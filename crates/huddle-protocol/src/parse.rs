//! Boundary decoding of client frames.
//!
//! Raw text frames are decoded once into a closed set of validated
//! commands. Anything malformed is rejected here, before it reaches the
//! coordinator.

use huddle_core::{ConnectionId, DomainError, Identity, NegotiationKind, SessionId, UserId};
use thiserror::Error;

use crate::message::ClientEvent;

/// Where a negotiation message should be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Exactly one named peer
    Direct(ConnectionId),

    /// Every other member of the room.
    ///
    /// Compatibility fallback for clients that do not know their peer's
    /// connection ID.
    Room,
}

/// A validated negotiation message awaiting relay.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationRequest {
    pub kind: NegotiationKind,
    pub route: Route,
    pub session_id: SessionId,
    pub payload: serde_json::Value,
}

/// A validated inbound command.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Join {
        session_id: SessionId,
        identity: Identity,
    },
    Negotiate(NegotiationRequest),
    Leave {
        session_id: SessionId,
    },
}

/// Errors produced while decoding a client frame.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// Not JSON, unknown event type, or a required field is missing
    #[error("malformed event: {0}")]
    Malformed(String),

    /// A negotiation event had a null payload
    #[error("{kind} event has no payload")]
    MissingPayload { kind: NegotiationKind },

    /// A field failed domain validation
    #[error("invalid event: {0}")]
    Invalid(#[from] DomainError),
}

/// Decodes and validates one text frame.
pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
    let event: ClientEvent =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    Inbound::try_from(event)
}

impl TryFrom<ClientEvent> for Inbound {
    type Error = ProtocolError;

    fn try_from(event: ClientEvent) -> Result<Self, Self::Error> {
        match event {
            ClientEvent::JoinRoom {
                session_id,
                user_id,
                user_name,
            } => Ok(Inbound::Join {
                session_id: SessionId::parse(session_id)?,
                identity: Identity::new(UserId::parse(user_id)?, user_name),
            }),
            ClientEvent::SendOffer {
                target_connection_id,
                session_id,
                offer,
            } => negotiation(NegotiationKind::Offer, target_connection_id, session_id, offer),
            ClientEvent::SendAnswer {
                target_connection_id,
                session_id,
                answer,
            } => negotiation(NegotiationKind::Answer, target_connection_id, session_id, answer),
            ClientEvent::SendCandidate {
                target_connection_id,
                session_id,
                candidate,
            } => negotiation(
                NegotiationKind::Candidate,
                target_connection_id,
                session_id,
                candidate,
            ),
            ClientEvent::LeaveRoom { session_id } => Ok(Inbound::Leave {
                session_id: SessionId::parse(session_id)?,
            }),
        }
    }
}

fn negotiation(
    kind: NegotiationKind,
    target: Option<String>,
    session_id: String,
    payload: serde_json::Value,
) -> Result<Inbound, ProtocolError> {
    if payload.is_null() {
        return Err(ProtocolError::MissingPayload { kind });
    }

    // A blank target is treated like an absent one.
    let route = match target {
        Some(t) if !t.trim().is_empty() => Route::Direct(ConnectionId::new(t)),
        _ => Route::Room,
    };

    Ok(Inbound::Negotiate(NegotiationRequest {
        kind,
        route,
        session_id: SessionId::parse(session_id)?,
        payload,
    }))
}
