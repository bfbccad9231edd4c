//! Huddle Protocol - Wire events for browser signaling clients
//!
//! This crate provides the JSON event types exchanged over the WebSocket
//! between browser peers and the coordinator, and the boundary decoding
//! that turns raw frames into validated commands.

pub mod message;
pub mod parse;

pub use message::{ClientEvent, RelayedNegotiation, ServerEvent};
pub use parse::{decode, Inbound, NegotiationRequest, ProtocolError, Route};
