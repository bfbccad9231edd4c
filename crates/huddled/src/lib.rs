//! Huddle Daemon - peer signaling coordinator
//!
//! This crate provides the core infrastructure for the Huddle daemon:
//! - `config` - Environment-driven server configuration
//! - `registry` - Connection registry and room directory (plain data)
//! - `coordinator` - Actor owning the registry, implementing join, relay and departure
//! - `server` - WebSocket server and per-connection handlers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      huddled daemon                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  SignalServer   │────▶│     CoordinatorActor        │   │
//! │  │  (WebSocket)    │     │  (connection + room owner)  │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ room events       │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │   broadcast::Sender         │   │
//! │  │  (per client)   │     │   (RoomEvent)               │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Negotiation payloads are forwarded untouched; the daemon never stores
//! or inspects them.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod coordinator;
pub mod registry;
pub mod server;
