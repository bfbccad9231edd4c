//! Room Directory - session ID to member connection IDs.
//!
//! A room exists exactly while its member set is non-empty: the first
//! `add` creates the entry and the `remove` that empties it deletes the
//! entry. There is no separate create/destroy call.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use huddle_core::{ConnectionId, SessionId};

use super::RegistryError;

#[derive(Debug)]
struct Room {
    members: HashSet<ConnectionId>,
    opened_at: DateTime<Utc>,
}

/// Outcome of removing a connection from a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The connection was not a member; nothing changed
    NotMember,

    /// Removed; other members remain
    Removed { remaining: usize },

    /// Removed the last member; the room entry is gone
    Closed { open_for: chrono::Duration },
}

/// Maps each session ID to its current member set.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: HashMap<SessionId, Room>,
    max_room_size: usize,
}

impl RoomDirectory {
    pub fn new(max_room_size: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            max_room_size,
        }
    }

    /// Checks whether one more connection may join the room.
    ///
    /// # Errors
    /// - `RegistryError::RoomFull` if the room is at maximum size
    pub fn check_capacity(&self, session_id: &SessionId) -> Result<(), RegistryError> {
        if self.member_count(session_id) >= self.max_room_size {
            return Err(RegistryError::RoomFull {
                session_id: session_id.clone(),
                max: self.max_room_size,
            });
        }
        Ok(())
    }

    /// Inserts a connection into a room, creating the room if absent.
    ///
    /// Adding an existing member is a no-op. Returns true if this call
    /// opened the room.
    ///
    /// # Errors
    /// - `RegistryError::RoomFull` if a new member would exceed the room size
    pub fn add(
        &mut self,
        session_id: &SessionId,
        connection_id: ConnectionId,
    ) -> Result<bool, RegistryError> {
        if self.contains(session_id, &connection_id) {
            return Ok(false);
        }
        self.check_capacity(session_id)?;

        let opened = !self.rooms.contains_key(session_id);
        self.rooms
            .entry(session_id.clone())
            .or_insert_with(|| Room {
                members: HashSet::new(),
                opened_at: Utc::now(),
            })
            .members
            .insert(connection_id);

        Ok(opened)
    }

    /// Returns a snapshot of the room's members (empty if the room is absent).
    ///
    /// Callers exclude themselves where needed.
    pub fn members(&self, session_id: &SessionId) -> Vec<ConnectionId> {
        self.rooms
            .get(session_id)
            .map(|room| room.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes a connection, deleting the room if it becomes empty.
    pub fn remove(&mut self, session_id: &SessionId, connection_id: &ConnectionId) -> Removal {
        let Some(room) = self.rooms.get_mut(session_id) else {
            return Removal::NotMember;
        };

        if !room.members.remove(connection_id) {
            return Removal::NotMember;
        }

        if !room.members.is_empty() {
            return Removal::Removed {
                remaining: room.members.len(),
            };
        }

        let open_for = self
            .rooms
            .remove(session_id)
            .map(|room| Utc::now().signed_duration_since(room.opened_at))
            .unwrap_or_else(chrono::Duration::zero);

        Removal::Closed { open_for }
    }

    pub fn contains(&self, session_id: &SessionId, connection_id: &ConnectionId) -> bool {
        self.rooms
            .get(session_id)
            .is_some_and(|room| room.members.contains(connection_id))
    }

    pub fn member_count(&self, session_id: &SessionId) -> usize {
        self.rooms.get(session_id).map_or(0, |room| room.members.len())
    }

    /// Number of open (non-empty) rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Session IDs of all open rooms.
    pub fn sessions(&self) -> Vec<SessionId> {
        self.rooms.keys().cloned().collect()
    }
}
