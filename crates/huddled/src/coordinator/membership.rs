//! Join protocol.
//!
//! A join runs entirely inside one actor command: identity is attached,
//! the room is snapshotted, the joiner is inserted, and every notification
//! is queued before the next command is processed.

use tracing::{info, warn};

use huddle_core::{ConnectionId, Identity, Participant, SessionId};
use huddle_protocol::ServerEvent;

use super::actor::CoordinatorActor;
use super::commands::{CoordinatorError, DepartureReason, JoinOutcome, RoomEvent};

impl CoordinatorActor {
    /// Announces a connection's identity and adds it to a session's room.
    ///
    /// Delivers, in order:
    /// 1. `existing-members` to the joiner (prior members, by arrival)
    /// 2. `member-joined` to each prior member
    /// 3. `join-ack` to the joiner
    ///
    /// Re-joining the room the connection is already in skips step 2.
    /// Joining a different room first departs the old one.
    ///
    /// # Errors
    /// - `CoordinatorError::UnknownConnection` if the connection is not registered
    /// - `CoordinatorError::Registry(RoomFull)` if the room is at maximum size;
    ///   nothing is delivered and the connection keeps its current room
    pub(super) fn handle_join(
        &mut self,
        connection_id: ConnectionId,
        session_id: SessionId,
        identity: Identity,
    ) -> Result<JoinOutcome, CoordinatorError> {
        if !self.connections.contains(&connection_id) {
            return Err(CoordinatorError::UnknownConnection(connection_id));
        }

        let previous = self.connections.current_room(&connection_id).cloned();
        let rejoined = previous.as_ref() == Some(&session_id);

        if !rejoined {
            if let Err(e) = self.rooms.check_capacity(&session_id) {
                warn!(
                    connection_id = %connection_id,
                    session_id = %session_id,
                    error = %e,
                    "Join rejected"
                );
                return Err(e.into());
            }

            if let Some(old_room) = previous {
                self.depart(&connection_id, &old_room, DepartureReason::SwitchedRoom);
            }
        }

        let participant = Participant::from_identity(connection_id.clone(), &identity);
        self.connections.attach_identity(&connection_id, identity);

        // Snapshot before inserting so the joiner never sees itself
        let existing_members = self.ordered_members_except(&session_id, Some(&connection_id));

        let opened = if rejoined {
            false
        } else {
            let opened = self.rooms.add(&session_id, connection_id.clone())?;
            self.connections
                .set_room(&connection_id, Some(session_id.clone()));
            opened
        };

        self.connections.deliver(
            &connection_id,
            ServerEvent::existing_members(existing_members.clone()),
        );

        if !rejoined {
            let announcement = ServerEvent::member_joined(participant.clone());
            self.deliver_all(
                existing_members.iter().map(|p| &p.connection_id),
                &announcement,
            );
        }

        let member_count = self.rooms.member_count(&session_id);
        self.connections.deliver(
            &connection_id,
            ServerEvent::join_ack(session_id.clone(), member_count),
        );

        if opened {
            self.publish(RoomEvent::Opened {
                session_id: session_id.clone(),
            });
        }
        if !rejoined {
            self.publish(RoomEvent::MemberJoined {
                session_id: session_id.clone(),
                participant,
            });
        }

        info!(
            connection_id = %connection_id,
            session_id = %session_id,
            member_count,
            rejoined,
            "Joined room"
        );

        Ok(JoinOutcome {
            existing_members,
            member_count,
            rejoined,
        })
    }
}
