//! Departure handling: explicit leave and transport loss.

use tracing::{debug, info};

use huddle_core::{ConnectionId, SessionId};
use huddle_protocol::ServerEvent;

use super::actor::CoordinatorActor;
use super::commands::{DepartureReason, RoomEvent};
use crate::registry::Removal;

impl CoordinatorActor {
    /// Leaves a room without closing the transport.
    ///
    /// A no-op unless the connection is currently in `session_id`.
    pub(super) fn handle_leave(&mut self, connection_id: &ConnectionId, session_id: &SessionId) -> bool {
        if self.connections.current_room(connection_id) != Some(session_id) {
            debug!(
                connection_id = %connection_id,
                session_id = %session_id,
                "Leave ignored: not in that room"
            );
            return false;
        }

        self.depart(connection_id, session_id, DepartureReason::Left)
    }

    /// Drops all state for a closed transport.
    ///
    /// Idempotent: a second call for the same connection finds nothing.
    pub(super) fn handle_disconnect(&mut self, connection_id: &ConnectionId) {
        if let Some(room) = self.connections.current_room(connection_id).cloned() {
            self.depart(connection_id, &room, DepartureReason::Disconnected);
        }

        match self.connections.unregister(connection_id) {
            Some(record) => {
                let connected_for = chrono::Utc::now().signed_duration_since(record.connected_at());
                info!(
                    connection_id = %connection_id,
                    connected_secs = connected_for.num_seconds(),
                    "Connection closed"
                );
            }
            None => {
                debug!(connection_id = %connection_id, "Disconnect for unknown connection");
            }
        }
    }

    /// Removes a connection from a room and tells the remaining members.
    ///
    /// Returns false if the connection was not a member.
    pub(super) fn depart(
        &mut self,
        connection_id: &ConnectionId,
        session_id: &SessionId,
        reason: DepartureReason,
    ) -> bool {
        let removal = self.rooms.remove(session_id, connection_id);
        self.connections.set_room(connection_id, None);

        if removal == Removal::NotMember {
            return false;
        }

        if let Some(participant) = self.connections.participant(connection_id) {
            let remaining = self.rooms.members(session_id);
            self.deliver_all(&remaining, &ServerEvent::member_left(participant.clone()));

            self.publish(RoomEvent::MemberLeft {
                session_id: session_id.clone(),
                participant,
                reason,
            });
        }

        info!(
            connection_id = %connection_id,
            session_id = %session_id,
            reason = %reason,
            "Left room"
        );

        if let Removal::Closed { open_for } = removal {
            info!(
                session_id = %session_id,
                open_secs = open_for.num_seconds(),
                "Room closed"
            );
            self.publish(RoomEvent::Closed {
                session_id: session_id.clone(),
                open_for,
            });
        }

        true
    }
}
