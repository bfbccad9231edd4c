//! Connection and room state owned by the coordinator actor.
//!
//! Two plain (non-async) data structures live here:
//! - `ConnectionRegistry`: one record per live transport, keyed by `ConnectionId`
//! - `RoomDirectory`: session ID → set of member `ConnectionId`s
//!
//! The directory never owns connection records; it stores identifiers only
//! and resolves them through the registry. Neither type is shared between
//! tasks: the coordinator actor owns both and serializes every mutation.
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - Lookups of unknown identifiers return `None`/`false`, never panic

use thiserror::Error;

use huddle_core::SessionId;

mod connections;
mod rooms;

pub use connections::{ConnectionRecord, ConnectionRegistry, Outbox};
pub use rooms::{Removal, RoomDirectory};

/// Errors raised when a capacity limit would be exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry already holds the maximum number of live connections.
    #[error("connection limit reached (max: {max} connections)")]
    ConnectionLimit { max: usize },

    /// The room already holds the maximum number of members.
    #[error("room {session_id} is full (max: {max} members)")]
    RoomFull { session_id: SessionId, max: usize },
}
