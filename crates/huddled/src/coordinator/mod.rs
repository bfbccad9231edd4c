//! Signaling coordinator using the Actor pattern.
//!
//! The coordinator is the single owner of connection and room state. It
//! receives commands from connection handlers via a tokio mpsc channel,
//! pushes client notifications into per-connection outboxes, and publishes
//! room lifecycle events on a broadcast channel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ ConnectionHandler│────▶│ CoordinatorActor │────▶│ Broadcast Channel│
//! └──────────────────┘     └──────────────────┘     └──────────────────┘
//!          │                        │                        │
//!          │  CoordinatorCommand    │  ServerEvent           │  RoomEvent
//!          │  (mpsc channel)        │  (per-connection       │
//!          ▼                        ▼   outbox)              ▼
//!    join / relay /          ConnectionRegistry +     Embedding server
//!    leave / disconnect      RoomDirectory            (marks sessions done)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

use crate::config::CoordinatorLimits;

mod actor;
mod commands;
mod departure;
mod handle;
mod membership;
mod relay;

pub use actor::CoordinatorActor;
pub use commands::{
    CoordinatorCommand, CoordinatorError, CoordinatorStats, DepartureReason, JoinOutcome,
    RelayOutcome, RoomEvent,
};
pub use handle::CoordinatorHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawn the coordinator actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the CoordinatorActor on a tokio task
/// 3. Returns a CoordinatorHandle for connection handlers
///
/// The actor stops once every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use huddled::config::CoordinatorLimits;
/// use huddled::coordinator::spawn_coordinator;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_coordinator(CoordinatorLimits::default());
///
///     let stats = handle.stats().await;
/// }
/// ```
pub fn spawn_coordinator(limits: CoordinatorLimits) -> CoordinatorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = CoordinatorActor::new(cmd_rx, event_tx.clone(), limits);
    tokio::spawn(actor.run());

    CoordinatorHandle::new(cmd_tx, event_tx)
}
