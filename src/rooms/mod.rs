use std::collections::HashMap;
use std::fmt;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use uuid::Uuid;

use crate::models::event::Frame;

pub type ConnectionId = Uuid;

/// A named broadcast target. Rooms exist implicitly: they appear on first
/// join and disappear when the last member leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Restaurant(i64),
    User(i64),
    Courier(i64),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Restaurant(id) => write!(f, "restaurant:{id}"),
            Room::User(id) => write!(f, "user:{id}"),
            Room::Courier(id) => write!(f, "courier:{id}"),
        }
    }
}

/// Group membership of live connections plus fan-out. Sends are
/// fire-and-forget: a frame queued to a connection that is closing is
/// silently dropped, and delivery order is FIFO per connection only.
#[derive(Default)]
pub struct RoomRouter {
    rooms: DashMap<Room, HashMap<ConnectionId, UnboundedSender<String>>>,
    memberships: DashMap<ConnectionId, Vec<Room>>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, room: Room, connection: ConnectionId, sender: UnboundedSender<String>) {
        self.rooms.entry(room).or_default().insert(connection, sender);

        let mut joined = self.memberships.entry(connection).or_default();
        if !joined.contains(&room) {
            joined.push(room);
        }
    }

    pub fn leave(&self, room: Room, connection: ConnectionId) {
        self.remove_member(room, connection);

        if let Some(mut joined) = self.memberships.get_mut(&connection) {
            joined.retain(|r| *r != room);
        }
    }

    /// Revokes every membership of a closed connection.
    pub fn drop_connection(&self, connection: ConnectionId) {
        let Some((_, joined)) = self.memberships.remove(&connection) else {
            return;
        };
        for room in joined {
            self.remove_member(room, connection);
        }
    }

    /// Emits one frame to every current member of the room and returns how
    /// many members it reached. An empty room is a no-op, not an error.
    pub fn broadcast<T: Serialize>(&self, room: Room, event: &str, data: &T) -> usize {
        let frame = match Frame::encode(event, data) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%room, event, error = %err, "failed to serialize broadcast frame");
                return 0;
            }
        };

        let Some(members) = self.rooms.get(&room) else {
            return 0;
        };

        let mut delivered = 0;
        for sender in members.values() {
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_member(&self, room: Room, connection: ConnectionId) {
        let emptied = match self.rooms.get_mut(&room) {
            Some(mut members) => {
                members.remove(&connection);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.rooms.remove_if(&room, |_, members| members.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::{Room, RoomRouter};

    #[test]
    fn broadcast_to_empty_room_is_a_noop() {
        let router = RoomRouter::new();
        let delivered = router.broadcast(Room::User(1), "order_status", &"hello");
        assert_eq!(delivered, 0);
    }

    #[test]
    fn broadcast_reaches_every_member() {
        let router = RoomRouter::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        router.join(Room::Restaurant(9), Uuid::new_v4(), tx_a);
        router.join(Room::Restaurant(9), Uuid::new_v4(), tx_b);

        let delivered = router.broadcast(Room::Restaurant(9), "new_order", &[1, 2, 3]);
        assert_eq!(delivered, 2);

        let frame = rx_a.try_recv().unwrap();
        assert!(frame.contains("\"event\":\"new_order\""));
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn frames_arrive_in_emit_order_per_connection() {
        let router = RoomRouter::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        router.join(Room::User(5), Uuid::new_v4(), tx);

        router.broadcast(Room::User(5), "order_status", &"first");
        router.broadcast(Room::User(5), "order_status", &"second");

        assert!(rx.try_recv().unwrap().contains("first"));
        assert!(rx.try_recv().unwrap().contains("second"));
    }

    #[test]
    fn leave_removes_membership_and_empty_room() {
        let router = RoomRouter::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = Uuid::new_v4();

        router.join(Room::Courier(3), connection, tx);
        assert_eq!(router.room_count(), 1);

        router.leave(Room::Courier(3), connection);
        assert_eq!(router.room_count(), 0);
        assert_eq!(router.broadcast(Room::Courier(3), "order_status", &"gone"), 0);
    }

    #[test]
    fn drop_connection_revokes_all_memberships() {
        let router = RoomRouter::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = Uuid::new_v4();

        router.join(Room::User(1), connection, tx.clone());
        router.join(Room::Courier(1), connection, tx);
        assert_eq!(router.room_count(), 2);

        router.drop_connection(connection);
        assert_eq!(router.room_count(), 0);
    }

    #[test]
    fn send_to_a_closed_connection_is_dropped_silently() {
        let router = RoomRouter::new();
        let (tx, rx) = mpsc::unbounded_channel();
        router.join(Room::User(2), Uuid::new_v4(), tx);
        drop(rx);

        let delivered = router.broadcast(Room::User(2), "order_status", &"late");
        assert_eq!(delivered, 0);
    }
}
