//! Huddle Core - Shared types for the peer signaling coordinator
//!
//! This crate provides the domain identifiers and records shared between
//! the wire protocol (huddle-protocol) and the daemon (huddled).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod ids;
pub mod negotiation;
pub mod participant;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use ids::{ConnectionId, SessionId, UserId};
pub use negotiation::NegotiationKind;
pub use participant::{ConnectionState, Identity, Participant};
