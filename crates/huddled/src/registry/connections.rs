//! Connection Registry - one record per live transport connection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use huddle_core::{ConnectionId, ConnectionState, Identity, Participant, SessionId};
use huddle_protocol::ServerEvent;

use super::RegistryError;

/// Outbound mailbox of a connection, drained by its writer task.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// State the coordinator keeps for one live connection.
#[derive(Debug)]
pub struct ConnectionRecord {
    outbox: Outbox,

    /// Announced identity (None until the first join)
    identity: Option<Identity>,

    /// Room the connection is currently in
    room: Option<SessionId>,

    /// Arrival order within the current room; orders `existing-members`
    join_seq: u64,

    connected_at: DateTime<Utc>,
}

impl ConnectionRecord {
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn room(&self) -> Option<&SessionId> {
        self.room.as_ref()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

/// Tracks every live connection and the identity attached to it.
///
/// Identifiers come from a monotonically increasing counter and are never
/// reused, so a stale `targetConnectionId` can only ever miss.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionRecord>,
    next_connection: u64,
    next_join: u64,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_connection: 0,
            next_join: 0,
            max_connections,
        }
    }

    /// Registers a freshly connected transport and returns its new ID.
    ///
    /// # Errors
    /// - `RegistryError::ConnectionLimit` if at maximum capacity
    pub fn register(&mut self, outbox: Outbox) -> Result<ConnectionId, RegistryError> {
        if self.connections.len() >= self.max_connections {
            return Err(RegistryError::ConnectionLimit {
                max: self.max_connections,
            });
        }

        let id = ConnectionId::from_sequence(self.next_connection);
        self.next_connection += 1;

        self.connections.insert(
            id.clone(),
            ConnectionRecord {
                outbox,
                identity: None,
                room: None,
                join_seq: 0,
                connected_at: Utc::now(),
            },
        );

        Ok(id)
    }

    /// Records identity claims for a connection, overwriting earlier ones.
    ///
    /// Returns false if the connection is not registered.
    pub fn attach_identity(&mut self, id: &ConnectionId, identity: Identity) -> bool {
        match self.connections.get_mut(id) {
            Some(record) => {
                record.identity = Some(identity);
                true
            }
            None => false,
        }
    }

    /// Returns the identity announced by a connection, if any.
    pub fn lookup(&self, id: &ConnectionId) -> Option<&Identity> {
        self.connections.get(id).and_then(|r| r.identity.as_ref())
    }

    /// Returns the public view of an announced connection.
    pub fn participant(&self, id: &ConnectionId) -> Option<Participant> {
        self.lookup(id)
            .map(|identity| Participant::from_identity(id.clone(), identity))
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&ConnectionRecord> {
        self.connections.get(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Returns the room a connection is currently in.
    pub fn current_room(&self, id: &ConnectionId) -> Option<&SessionId> {
        self.connections.get(id).and_then(|r| r.room.as_ref())
    }

    /// Sets or clears a connection's room.
    ///
    /// Entering a room stamps the next arrival sequence number.
    pub fn set_room(&mut self, id: &ConnectionId, room: Option<SessionId>) {
        if let Some(record) = self.connections.get_mut(id) {
            if room.is_some() {
                self.next_join += 1;
                record.join_seq = self.next_join;
            }
            record.room = room;
        }
    }

    /// Returns the arrival sequence number of a connection in its room.
    pub fn join_seq(&self, id: &ConnectionId) -> Option<u64> {
        self.connections
            .get(id)
            .filter(|r| r.room.is_some())
            .map(|r| r.join_seq)
    }

    /// Returns the lifecycle state of a connection (`Closed` if unknown).
    pub fn state(&self, id: &ConnectionId) -> ConnectionState {
        match self.connections.get(id) {
            Some(record) => ConnectionState::derive(record.identity.is_some(), record.room.is_some()),
            None => ConnectionState::Closed,
        }
    }

    /// Pushes an event to a connection's outbox.
    ///
    /// Returns false if the connection is gone or its writer has stopped.
    /// Delivery failure is never an error: the peer is simply departing.
    pub fn deliver(&self, id: &ConnectionId, event: ServerEvent) -> bool {
        let Some(record) = self.connections.get(id) else {
            debug!(connection_id = %id, "Delivery skipped: connection not registered");
            return false;
        };

        if record.outbox.send(event).is_err() {
            debug!(connection_id = %id, "Delivery skipped: outbox closed");
            return false;
        }

        true
    }

    /// Removes all state for a connection.
    ///
    /// Safe to call for connections that never announced or already left.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<ConnectionRecord> {
        self.connections.remove(id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Maximum number of live connections.
    pub fn capacity(&self) -> usize {
        self.max_connections
    }

    /// Number of connections currently in a room.
    pub fn joined_count(&self) -> usize {
        self.connections.values().filter(|r| r.room.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::UserId;

    fn outbox() -> (Outbox, mpsc::UnboundedReceiver<ServerEvent>) {
        mpsc::unbounded_channel()
    }

    fn identity(user: &str) -> Identity {
        Identity::new(UserId::new(user), format!("{user} name"))
    }

    #[test]
    fn test_register_assigns_unique_ids() {
        let mut registry = ConnectionRegistry::new(10);
        let (tx, _rx) = outbox();

        let a = registry.register(tx.clone()).unwrap();
        let b = registry.register(tx).unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.state(&a), ConnectionState::Connected);
    }

    #[test]
    fn test_ids_not_reused_after_unregister() {
        let mut registry = ConnectionRegistry::new(10);
        let (tx, _rx) = outbox();

        let a = registry.register(tx.clone()).unwrap();
        registry.unregister(&a);
        let b = registry.register(tx).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_connection_limit() {
        let mut registry = ConnectionRegistry::new(1);
        let (tx, _rx) = outbox();

        registry.register(tx.clone()).unwrap();
        assert_eq!(
            registry.register(tx),
            Err(RegistryError::ConnectionLimit { max: 1 })
        );
    }

    #[test]
    fn test_attach_identity_overwrites() {
        let mut registry = ConnectionRegistry::new(10);
        let (tx, _rx) = outbox();
        let id = registry.register(tx).unwrap();

        assert!(registry.attach_identity(&id, identity("alice")));
        assert!(registry.attach_identity(&id, identity("alice-2")));

        assert_eq!(registry.lookup(&id).unwrap().user_id.as_str(), "alice-2");
        assert_eq!(registry.state(&id), ConnectionState::Announced);
    }

    #[test]
    fn test_attach_identity_unknown_connection() {
        let mut registry = ConnectionRegistry::new(10);
        assert!(!registry.attach_identity(&ConnectionId::new("conn-99"), identity("bob")));
    }

    #[test]
    fn test_set_room_orders_arrivals() {
        let mut registry = ConnectionRegistry::new(10);
        let (tx, _rx) = outbox();
        let a = registry.register(tx.clone()).unwrap();
        let b = registry.register(tx).unwrap();

        registry.set_room(&b, Some(SessionId::new("s1")));
        registry.set_room(&a, Some(SessionId::new("s1")));

        assert!(registry.join_seq(&b).unwrap() < registry.join_seq(&a).unwrap());
        assert_eq!(registry.joined_count(), 2);

        registry.set_room(&a, None);
        assert_eq!(registry.join_seq(&a), None);
        assert_eq!(registry.current_room(&a), None);
    }

    #[test]
    fn test_deliver_to_live_and_missing_connections() {
        let mut registry = ConnectionRegistry::new(10);
        let (tx, mut rx) = outbox();
        let id = registry.register(tx).unwrap();

        assert!(registry.deliver(&id, ServerEvent::connected(id.clone())));
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Connected { .. })));

        assert!(!registry.deliver(&ConnectionId::new("conn-99"), ServerEvent::connected(id.clone())));

        drop(rx);
        assert!(!registry.deliver(&id, ServerEvent::connected(id.clone())));
    }

    #[test]
    fn test_unregister_never_announced() {
        let mut registry = ConnectionRegistry::new(10);
        let (tx, _rx) = outbox();
        let id = registry.register(tx).unwrap();

        assert!(registry.unregister(&id).is_some());
        assert!(registry.unregister(&id).is_none());
        assert_eq!(registry.state(&id), ConnectionState::Closed);
        assert!(registry.is_empty());
    }
}
