//! Room hub: one broadcast channel per room, created on demand

use mta_common::events::RealtimeEvent;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

/// Events buffered per room before slow receivers lag
const ROOM_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// Everything addressed to one user, across all their connections
    User(String),
    Conversation(String),
    /// Every connected client
    Broadcast,
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "user:{}", id),
            Room::Conversation(id) => write!(f, "conversation:{}", id),
            Room::Broadcast => write!(f, "broadcast"),
        }
    }
}

#[derive(Clone, Default)]
pub struct RoomHub {
    rooms: Arc<Mutex<HashMap<Room, broadcast::Sender<RealtimeEvent>>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<Room, broadcast::Sender<RealtimeEvent>>> {
        // A panicked holder cannot leave the map half-updated
        self.rooms.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self, room: Room) -> broadcast::Receiver<RealtimeEvent> {
        let mut rooms = self.rooms();
        rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Send to every receiver of `room`; returns how many received it
    ///
    /// Rooms without receivers are dropped.
    pub fn publish(&self, room: &Room, event: RealtimeEvent) -> usize {
        let mut rooms = self.rooms();
        let Some(sender) = rooms.get(room) else {
            return 0;
        };

        match sender.send(event) {
            Ok(count) => {
                debug!("Published to {} ({} receivers)", room, count);
                count
            }
            Err(_) => {
                rooms.remove(room);
                0
            }
        }
    }

    /// Send the same event to several rooms
    pub fn publish_many<'a>(&self, rooms: impl IntoIterator<Item = &'a Room>, event: &RealtimeEvent) -> usize {
        rooms
            .into_iter()
            .map(|room| self.publish(room, event.clone()))
            .sum()
    }

    /// Drop rooms nobody listens to; returns how many were removed
    pub fn prune(&self) -> usize {
        let mut rooms = self.rooms();
        let before = rooms.len();
        rooms.retain(|_, sender| sender.receiver_count() > 0);
        before - rooms.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms().len()
    }

    pub fn receiver_count(&self, room: &Room) -> usize {
        self.rooms().get(room).map_or(0, |sender| sender.receiver_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let hub = RoomHub::new();
        let room = Room::User("u1".into());
        let mut a = hub.subscribe(room.clone());
        let mut b = hub.subscribe(room.clone());

        assert_eq!(hub.publish(&room, RealtimeEvent::Pong), 2);
        assert_eq!(a.recv().await.unwrap(), RealtimeEvent::Pong);
        assert_eq!(b.recv().await.unwrap(), RealtimeEvent::Pong);
    }

    #[test]
    fn test_publish_to_unknown_room_delivers_nothing() {
        let hub = RoomHub::new();
        assert_eq!(hub.publish(&Room::Broadcast, RealtimeEvent::Pong), 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn test_rooms_are_isolated() {
        let hub = RoomHub::new();
        let mut rx = hub.subscribe(Room::Conversation("c1".into()));

        hub.publish(&Room::Conversation("c2".into()), RealtimeEvent::Pong);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_prunes_room_without_receivers() {
        let hub = RoomHub::new();
        let room = Room::Conversation("c1".into());
        drop(hub.subscribe(room.clone()));
        assert_eq!(hub.room_count(), 1);

        assert_eq!(hub.publish(&room, RealtimeEvent::Pong), 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn test_prune_keeps_live_rooms() {
        let hub = RoomHub::new();
        let _live = hub.subscribe(Room::Broadcast);
        drop(hub.subscribe(Room::User("gone".into())));

        assert_eq!(hub.prune(), 1);
        assert_eq!(hub.room_count(), 1);
        assert_eq!(hub.receiver_count(&Room::Broadcast), 1);
    }

    #[test]
    fn test_publish_many_sums_deliveries() {
        let hub = RoomHub::new();
        let rooms = vec![Room::User("a".into()), Room::User("b".into())];
        let _a = hub.subscribe(rooms[0].clone());
        let _b = hub.subscribe(rooms[1].clone());

        assert_eq!(hub.publish_many(&rooms, &RealtimeEvent::Pong), 2);
    }
}
