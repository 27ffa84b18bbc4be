//! Event dispatcher: delivers outbound events to an [`Audience`].
//!
//! Every connection registers an unbounded outbox when it opens. Delivery
//! is a channel send, so it never blocks and never fails the caller: a
//! closed outbox (the client is already gone) is skipped and logged at
//! debug level.
//!
//! Events reach each outbox in the order `dispatch` is called. The engine
//! dispatches session events while holding the battle lock, so a
//! session's `battle-started` always precedes its terminal event.

use std::collections::HashMap;

use geoduel_protocol::{Audience, ServerEvent, Team};
use geoduel_transport::ConnectionId;
use tokio::sync::{RwLock, mpsc};

/// Channel sender delivering outbound events to one connection handler.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// What a connection currently is, as far as routing goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connected, not joined yet (or superseded by a rejoin elsewhere).
    Unjoined,
    Player(Team),
    Spectator,
}

struct Recipient {
    role: Role,
    outbox: Outbox,
}

/// Routes events to connections by audience.
#[derive(Default)]
pub struct Dispatcher {
    recipients: RwLock<HashMap<ConnectionId, Recipient>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection's outbox as [`Role::Unjoined`].
    pub async fn register(&self, conn: ConnectionId, outbox: Outbox) {
        self.recipients.write().await.insert(
            conn,
            Recipient {
                role: Role::Unjoined,
                outbox,
            },
        );
    }

    /// Changes how a registered connection is addressed. Unknown
    /// connections are ignored.
    pub async fn set_role(&self, conn: ConnectionId, role: Role) {
        if let Some(recipient) = self.recipients.write().await.get_mut(&conn) {
            recipient.role = role;
        }
    }

    pub async fn unregister(&self, conn: ConnectionId) {
        self.recipients.write().await.remove(&conn);
    }

    pub async fn role(&self, conn: ConnectionId) -> Option<Role> {
        self.recipients.read().await.get(&conn).map(|r| r.role)
    }

    /// Delivers `event` to every connection in `audience`. Returns how
    /// many outboxes accepted it.
    pub async fn dispatch(&self, audience: Audience, event: ServerEvent) -> usize {
        let recipients = self.recipients.read().await;

        let targets: Vec<(ConnectionId, &Recipient)> = match audience {
            Audience::Connection(conn) => recipients
                .get(&conn)
                .map(|r| (conn, r))
                .into_iter()
                .collect(),
            Audience::Pair(a, b) => [a, b]
                .into_iter()
                .filter_map(|conn| recipients.get(&conn).map(|r| (conn, r)))
                .collect(),
            Audience::Team(team) => recipients
                .iter()
                .filter(|(_, r)| r.role == Role::Player(team))
                .map(|(conn, r)| (*conn, r))
                .collect(),
            Audience::AllPlayers => recipients
                .iter()
                .filter(|(_, r)| matches!(r.role, Role::Player(_)))
                .map(|(conn, r)| (*conn, r))
                .collect(),
            Audience::Spectators => recipients
                .iter()
                .filter(|(_, r)| r.role == Role::Spectator)
                .map(|(conn, r)| (*conn, r))
                .collect(),
        };

        let mut delivered = 0;
        for (conn, recipient) in targets {
            if recipient.outbox.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(%conn, "outbox closed, dropping event");
            }
        }
        delivered
    }

    /// Shorthand for [`Audience::Connection`].
    pub async fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.dispatch(Audience::Connection(conn), event).await > 0
    }

    pub async fn len(&self) -> usize {
        self.recipients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.recipients.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn ping() -> ServerEvent {
        ServerEvent::HeartbeatAck {
            client_time: 1,
            server_time: 2,
        }
    }

    async fn registered(
        dispatcher: &Dispatcher,
        id: u64,
        role: Role,
    ) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        dispatcher.register(conn(id), tx).await;
        dispatcher.set_role(conn(id), role).await;
        rx
    }

    #[tokio::test]
    async fn test_dispatch_connection_reaches_only_that_connection() {
        let d = Dispatcher::new();
        let mut one = registered(&d, 1, Role::Unjoined).await;
        let mut two = registered(&d, 2, Role::Player(Team::A)).await;

        assert_eq!(d.dispatch(Audience::Connection(conn(1)), ping()).await, 1);

        assert_eq!(one.try_recv().unwrap(), ping());
        assert!(two.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_pair_skips_missing_member() {
        let d = Dispatcher::new();
        let mut one = registered(&d, 1, Role::Player(Team::A)).await;

        let delivered = d.dispatch(Audience::Pair(conn(1), conn(99)), ping()).await;

        assert_eq!(delivered, 1);
        assert!(one.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_team_reaches_only_that_team() {
        let d = Dispatcher::new();
        let mut a = registered(&d, 1, Role::Player(Team::A)).await;
        let mut b = registered(&d, 2, Role::Player(Team::B)).await;
        let mut s = registered(&d, 3, Role::Spectator).await;

        assert_eq!(d.dispatch(Audience::Team(Team::B), ping()).await, 1);

        assert!(a.try_recv().is_err());
        assert!(b.try_recv().is_ok());
        assert!(s.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_all_players_excludes_spectators_and_unjoined() {
        let d = Dispatcher::new();
        let _a = registered(&d, 1, Role::Player(Team::A)).await;
        let _b = registered(&d, 2, Role::Player(Team::B)).await;
        let mut s = registered(&d, 3, Role::Spectator).await;
        let mut u = registered(&d, 4, Role::Unjoined).await;

        assert_eq!(d.dispatch(Audience::AllPlayers, ping()).await, 2);
        assert!(s.try_recv().is_err());
        assert!(u.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_spectators_only() {
        let d = Dispatcher::new();
        let mut a = registered(&d, 1, Role::Player(Team::A)).await;
        let mut s = registered(&d, 2, Role::Spectator).await;

        assert_eq!(d.dispatch(Audience::Spectators, ping()).await, 1);
        assert!(a.try_recv().is_err());
        assert!(s.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_closed_outbox_is_dropped_silently() {
        let d = Dispatcher::new();
        let gone = registered(&d, 1, Role::Player(Team::A)).await;
        let mut alive = registered(&d, 2, Role::Player(Team::A)).await;
        drop(gone);

        let delivered = d.dispatch(Audience::Team(Team::A), ping()).await;

        assert_eq!(delivered, 1);
        assert!(alive.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_preserves_order_per_connection() {
        let d = Dispatcher::new();
        let mut rx = registered(&d, 1, Role::Player(Team::A)).await;

        for t in 0..5 {
            d.send_to(
                conn(1),
                ServerEvent::HeartbeatAck {
                    client_time: t,
                    server_time: t,
                },
            )
            .await;
        }

        for t in 0..5 {
            assert!(matches!(
                rx.try_recv().unwrap(),
                ServerEvent::HeartbeatAck { client_time, .. } if client_time == t
            ));
        }
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let d = Dispatcher::new();
        let _rx = registered(&d, 1, Role::Spectator).await;

        d.unregister(conn(1)).await;

        assert!(!d.send_to(conn(1), ping()).await);
        assert!(d.is_empty().await);
    }
}
