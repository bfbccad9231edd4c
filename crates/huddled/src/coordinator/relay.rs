//! Negotiation relay.
//!
//! One operation covers offers, answers and candidates. The sender fields
//! of every relayed message come from the registry, never from the client.

use tracing::debug;

use huddle_core::{ConnectionId, SessionId};
use huddle_protocol::{NegotiationRequest, RelayedNegotiation, Route, ServerEvent};

use super::actor::CoordinatorActor;
use super::commands::RelayOutcome;

impl CoordinatorActor {
    /// Stamps the sender's identity onto a negotiation payload and forwards it.
    ///
    /// An unannounced sender is stamped with empty user fields. Misses
    /// (unknown sender, unknown target, empty room) are dropped silently.
    pub(super) fn handle_relay(
        &mut self,
        sender: ConnectionId,
        request: NegotiationRequest,
    ) -> RelayOutcome {
        let NegotiationRequest {
            kind,
            route,
            session_id,
            payload,
        } = request;

        let Some(record) = self.connections.get(&sender) else {
            debug!(connection_id = %sender, kind = %kind, "Relay dropped: sender not registered");
            return RelayOutcome::Dropped;
        };
        let identity = record.identity().cloned().unwrap_or_default();

        let event = ServerEvent::negotiation(
            kind,
            RelayedNegotiation {
                payload,
                from_connection_id: sender.clone(),
                from_user_id: identity.user_id,
                from_user_name: identity.user_name,
                session_id: session_id.clone(),
            },
        );

        match route {
            Route::Direct(target) => self.relay_direct(&sender, &target, &session_id, event),
            Route::Room => self.relay_to_room(&sender, &session_id, event),
        }
    }

    fn relay_direct(
        &self,
        sender: &ConnectionId,
        target: &ConnectionId,
        session_id: &SessionId,
        event: ServerEvent,
    ) -> RelayOutcome {
        if !self.connections.contains(target) {
            debug!(
                from = %sender,
                to = %target,
                "Relay dropped: target not registered"
            );
            return RelayOutcome::Dropped;
        }

        if self.connections.current_room(target) != Some(session_id) {
            debug!(
                from = %sender,
                to = %target,
                session_id = %session_id,
                "Relay session does not match target's room"
            );
        }

        if self.connections.deliver(target, event) {
            debug!(from = %sender, to = %target, "Relayed negotiation message");
            RelayOutcome::Delivered { recipients: 1 }
        } else {
            RelayOutcome::Dropped
        }
    }

    /// Legacy fallback for clients that do not name a target: every other
    /// room member receives the message.
    ///
    /// Only a member of the room may broadcast into it.
    fn relay_to_room(
        &self,
        sender: &ConnectionId,
        session_id: &SessionId,
        event: ServerEvent,
    ) -> RelayOutcome {
        if self.connections.current_room(sender) != Some(session_id) {
            debug!(
                from = %sender,
                session_id = %session_id,
                "Legacy relay dropped: sender is not a member of the room"
            );
            return RelayOutcome::Dropped;
        }

        debug!(
            from = %sender,
            session_id = %session_id,
            "Legacy room relay (no targetConnectionId)"
        );

        let recipients: Vec<ConnectionId> = self
            .rooms
            .members(session_id)
            .into_iter()
            .filter(|id| id != sender)
            .collect();

        match self.deliver_all(&recipients, &event) {
            0 => RelayOutcome::Dropped,
            recipients => RelayOutcome::Delivered { recipients },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::actor::test_support::*;
    use super::*;
    use crate::config::CoordinatorLimits;
    use huddle_core::{NegotiationKind, UserId};
    use serde_json::json;

    fn request(kind: NegotiationKind, route: Route, session: &str) -> NegotiationRequest {
        NegotiationRequest {
            kind,
            route,
            session_id: SessionId::new(session),
            payload: json!({"sdp": "v=0"}),
        }
    }

    #[tokio::test]
    async fn test_direct_relay_stamps_sender_identity() {
        let (_, mut actor, _) = create_actor(CoordinatorLimits::default());
        let s1 = SessionId::new("s1");
        let (a, _a_rx) = connect(&mut actor);
        let (b, mut b_rx) = connect(&mut actor);
        actor.handle_join(a.clone(), s1.clone(), identity("alice")).unwrap();
        actor.handle_join(b.clone(), s1.clone(), identity("bob")).unwrap();
        drain(&mut b_rx);

        let outcome = actor.handle_relay(
            a.clone(),
            request(NegotiationKind::Offer, Route::Direct(b.clone()), "s1"),
        );

        assert_eq!(outcome, RelayOutcome::Delivered { recipients: 1 });
        let received = drain(&mut b_rx);
        assert_eq!(received.len(), 1);
        let (kind, body) = received[0].as_negotiation().unwrap();
        assert_eq!(kind, NegotiationKind::Offer);
        assert_eq!(body.from_connection_id, a);
        assert_eq!(body.from_user_id, UserId::new("alice"));
        assert_eq!(body.from_user_name, "alice name");
        assert_eq!(body.payload, json!({"sdp": "v=0"}));
    }

    #[tokio::test]
    async fn test_direct_relay_never_reaches_third_member() {
        let (_, mut actor, _) = create_actor(CoordinatorLimits::default());
        let s1 = SessionId::new("s1");
        let (a, _a_rx) = connect(&mut actor);
        let (b, mut b_rx) = connect(&mut actor);
        let (c, mut c_rx) = connect(&mut actor);
        for (id, name) in [(&a, "alice"), (&b, "bob"), (&c, "carol")] {
            actor.handle_join(id.clone(), s1.clone(), identity(name)).unwrap();
        }
        drain(&mut b_rx);
        drain(&mut c_rx);

        actor.handle_relay(a, request(NegotiationKind::Candidate, Route::Direct(b), "s1"));

        assert_eq!(drain(&mut b_rx).len(), 1);
        assert!(drain(&mut c_rx).is_empty());
    }

    #[tokio::test]
    async fn test_unannounced_sender_gets_empty_identity() {
        let (_, mut actor, _) = create_actor(CoordinatorLimits::default());
        let (a, _a_rx) = connect(&mut actor);
        let (b, mut b_rx) = connect(&mut actor);

        let outcome = actor.handle_relay(
            a.clone(),
            request(NegotiationKind::Answer, Route::Direct(b), "s1"),
        );

        assert_eq!(outcome, RelayOutcome::Delivered { recipients: 1 });
        let received = drain(&mut b_rx);
        let (_, body) = received[0].as_negotiation().unwrap();
        assert_eq!(body.from_connection_id, a);
        assert_eq!(body.from_user_id.as_str(), "");
        assert_eq!(body.from_user_name, "");
    }

    #[tokio::test]
    async fn test_relay_to_unknown_target_is_dropped() {
        let (_, mut actor, _) = create_actor(CoordinatorLimits::default());
        let (a, mut a_rx) = connect(&mut actor);

        let outcome = actor.handle_relay(
            a,
            request(
                NegotiationKind::Offer,
                Route::Direct(ConnectionId::new("conn-404")),
                "s1",
            ),
        );

        assert_eq!(outcome, RelayOutcome::Dropped);
        assert!(drain(&mut a_rx).is_empty());
    }

    #[tokio::test]
    async fn test_session_mismatch_still_delivered() {
        let (_, mut actor, _) = create_actor(CoordinatorLimits::default());
        let (a, _a_rx) = connect(&mut actor);
        let (b, mut b_rx) = connect(&mut actor);
        actor
            .handle_join(b.clone(), SessionId::new("s1"), identity("bob"))
            .unwrap();
        drain(&mut b_rx);

        let outcome = actor.handle_relay(
            a,
            request(NegotiationKind::Offer, Route::Direct(b), "other-session"),
        );

        assert_eq!(outcome, RelayOutcome::Delivered { recipients: 1 });
        let received = drain(&mut b_rx);
        let (_, body) = received[0].as_negotiation().unwrap();
        assert_eq!(body.session_id.as_str(), "other-session");
    }

    #[tokio::test]
    async fn test_legacy_room_relay_skips_sender() {
        let (_, mut actor, _) = create_actor(CoordinatorLimits::default());
        let s1 = SessionId::new("s1");
        let (a, mut a_rx) = connect(&mut actor);
        let (b, mut b_rx) = connect(&mut actor);
        let (c, mut c_rx) = connect(&mut actor);
        for (id, name) in [(&a, "alice"), (&b, "bob"), (&c, "carol")] {
            actor.handle_join(id.clone(), s1.clone(), identity(name)).unwrap();
        }
        drain(&mut a_rx);
        drain(&mut b_rx);
        drain(&mut c_rx);

        let outcome = actor.handle_relay(a, request(NegotiationKind::Offer, Route::Room, "s1"));

        assert_eq!(outcome, RelayOutcome::Delivered { recipients: 2 });
        assert!(drain(&mut a_rx).is_empty());
        assert_eq!(drain(&mut b_rx).len(), 1);
        assert_eq!(drain(&mut c_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_room_relay_from_outside_room_is_dropped() {
        let (_, mut actor, _) = create_actor(CoordinatorLimits::default());
        let s1 = SessionId::new("s1");
        let s2 = SessionId::new("s2");
        let (a, mut a_rx) = connect(&mut actor);
        let (b, mut b_rx) = connect(&mut actor);
        let (c, mut c_rx) = connect(&mut actor);
        actor.handle_join(a.clone(), s1, identity("alice")).unwrap();
        actor.handle_join(b.clone(), s2.clone(), identity("bob")).unwrap();
        actor.handle_join(c, s2, identity("carol")).unwrap();
        drain(&mut a_rx);
        drain(&mut b_rx);
        drain(&mut c_rx);

        let outcome = actor.handle_relay(a, request(NegotiationKind::Offer, Route::Room, "s2"));

        assert_eq!(outcome, RelayOutcome::Dropped);
        assert!(drain(&mut b_rx).is_empty());
        assert!(drain(&mut c_rx).is_empty());
    }

    #[tokio::test]
    async fn test_legacy_room_relay_to_empty_room() {
        let (_, mut actor, _) = create_actor(CoordinatorLimits::default());
        let (a, _a_rx) = connect(&mut actor);

        let outcome = actor.handle_relay(a, request(NegotiationKind::Offer, Route::Room, "nobody"));

        assert_eq!(outcome, RelayOutcome::Dropped);
    }
}
