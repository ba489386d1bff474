//! Live connections and match-addressed fan-out

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::game::{MatchNotice, MatchRegistry};

use super::protocol::ServerMsg;

/// Bounded outbound queue per connection
pub const OUTBOUND_QUEUE: usize = 256;

struct Connection {
    tx: mpsc::Sender<ServerMsg>,
    /// (player_id, match_id) once the connection has joined or reconnected
    seat: Option<(Uuid, Uuid)>,
}

/// Registry of open sockets keyed by connection id
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<Uuid, Connection>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tx: mpsc::Sender<ServerMsg>) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.connections.insert(conn_id, Connection { tx, seat: None });
        conn_id
    }

    /// Forget a connection, returning the seat it was addressed to
    pub fn unregister(&self, conn_id: Uuid) -> Option<(Uuid, Uuid)> {
        self.connections
            .remove(&conn_id)
            .and_then(|(_, conn)| conn.seat)
    }

    /// Bind a connection to a player seat; later broadcasts for `match_id` reach it
    pub fn address(&self, conn_id: Uuid, player_id: Uuid, match_id: Uuid) {
        if let Some(mut conn) = self.connections.get_mut(&conn_id) {
            conn.seat = Some((player_id, match_id));
        }
    }

    pub fn seat(&self, conn_id: Uuid) -> Option<(Uuid, Uuid)> {
        self.connections.get(&conn_id).and_then(|conn| conn.seat)
    }

    /// True if any open connection is addressed to `player_id`
    pub fn is_player_connected(&self, player_id: Uuid) -> bool {
        self.connections
            .iter()
            .any(|conn| conn.seat.is_some_and(|(pid, _)| pid == player_id))
    }

    pub fn send(&self, conn_id: Uuid, msg: ServerMsg) -> bool {
        let Some(tx) = self.connections.get(&conn_id).map(|conn| conn.tx.clone()) else {
            return false;
        };
        deliver(conn_id, &tx, msg)
    }

    /// Deliver `msg` to every connection addressed to `match_id`; returns the number reached
    pub fn broadcast(&self, match_id: Uuid, msg: &ServerMsg) -> usize {
        let targets: Vec<(Uuid, mpsc::Sender<ServerMsg>)> = self
            .connections
            .iter()
            .filter(|conn| conn.seat.is_some_and(|(_, mid)| mid == match_id))
            .map(|conn| (*conn.key(), conn.tx.clone()))
            .collect();

        targets
            .into_iter()
            .filter(|(conn_id, tx)| deliver(*conn_id, tx, msg.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Turn registry notices into `match_update` broadcasts until the registry goes away
    pub async fn run_dispatcher(
        self: Arc<Self>,
        registry: Arc<MatchRegistry>,
        mut notices: mpsc::UnboundedReceiver<MatchNotice>,
    ) {
        while let Some(MatchNotice { match_id }) = notices.recv().await {
            match registry.snapshot(match_id) {
                Ok(snapshot) => {
                    let reached = self.broadcast(match_id, &ServerMsg::MatchUpdate(snapshot));
                    debug!(match_id = %match_id, reached, "Match update broadcast");
                }
                Err(_) => debug!(match_id = %match_id, "Match gone before broadcast"),
            }
        }
        debug!("Notice channel closed, dispatcher stopping");
    }
}

fn deliver(conn_id: Uuid, tx: &mpsc::Sender<ServerMsg>, msg: ServerMsg) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(conn_id = %conn_id, "Outbound queue full, dropping message");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::test_registry;
    use crate::game::Player;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn broadcast_reaches_only_addressed_connections() {
        let hub = ConnectionHub::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let (tx_c, mut rx_c) = mpsc::channel(8);
        let a = hub.register(tx_a);
        let b = hub.register(tx_b);
        hub.register(tx_c);

        let match_id = Uuid::new_v4();
        hub.address(a, Uuid::new_v4(), match_id);
        hub.address(b, Uuid::new_v4(), match_id);

        assert_eq!(hub.broadcast(match_id, &ServerMsg::error("x")), 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn unregister_returns_the_seat() {
        let hub = ConnectionHub::new();
        let (tx, _rx) = mpsc::channel(8);
        let conn = hub.register(tx);
        let seat = (Uuid::new_v4(), Uuid::new_v4());
        hub.address(conn, seat.0, seat.1);

        assert!(hub.is_player_connected(seat.0));
        assert_eq!(hub.unregister(conn), Some(seat));
        assert!(!hub.is_player_connected(seat.0));
        assert_eq!(hub.len(), 0);
        assert!(!hub.send(conn, ServerMsg::error("gone")));
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let hub = ConnectionHub::new();
        let (tx, _rx) = mpsc::channel(1);
        let conn = hub.register(tx);
        assert!(hub.send(conn, ServerMsg::error("first")));
        assert!(!hub.send(conn, ServerMsg::error("second")));
    }

    #[tokio::test]
    async fn notices_become_match_updates() {
        let harness = test_registry();
        let hub = Arc::new(ConnectionHub::new());
        tokio::spawn(hub.clone().run_dispatcher(harness.registry.clone(), harness.notices));

        let shared = harness.registry.create_match(Player::human("alice", Utc::now()));
        let (match_id, p1) = {
            let game = shared.read();
            (game.id, game.player1.id)
        };
        let (tx, mut rx) = mpsc::channel(8);
        let conn = hub.register(tx);
        hub.address(conn, p1, match_id);

        harness
            .registry
            .join_match(match_id, Player::bot(Utc::now()))
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match msg {
            ServerMsg::MatchUpdate(snapshot) => {
                assert_eq!(snapshot.id, match_id);
                assert!(snapshot.player2.is_some_and(|p| p.is_bot));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
