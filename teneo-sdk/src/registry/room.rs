//! [`RoomRegistry`]: authoritative room metadata plus the subscribed-room set.

use std::collections::HashMap;

use teneo_types::Room;

/// Stores the authoritative room catalog and the currently subscribed set.
///
/// Mutated only by auth seeding and by subscribe/unsubscribe acknowledgements; local
/// subscribe/unsubscribe calls never speculatively update the subscribed set
/// (`spec.md` §4.5, §3 invariant: "authoritative only from server acknowledgements").
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    subscribed: Vec<String>,
    private_room_id: Option<String>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds authoritative room metadata and the private room id, as delivered at
    /// authentication time.
    pub fn seed(&mut self, rooms: Vec<Room>, private_room_id: Option<String>) {
        for room in rooms {
            self.rooms.insert(room.id.clone(), room);
        }
        self.private_room_id = private_room_id;
    }

    /// Replaces the subscribed-room set wholesale, as the server's authoritative
    /// `subscriptions` field dictates.
    pub fn set_subscribed(&mut self, subscriptions: Vec<String>) {
        self.subscribed = subscriptions;
    }

    /// Merges additional room metadata (e.g. from a `list_rooms` response) without
    /// touching the subscribed set.
    pub fn merge_rooms(&mut self, rooms: Vec<Room>) {
        for room in rooms {
            self.rooms.insert(room.id.clone(), room);
        }
    }

    /// Currently subscribed room ids.
    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.clone()
    }

    /// All known rooms.
    pub fn all(&self) -> Vec<Room> {
        self.rooms.values().cloned().collect()
    }

    /// A single room's metadata, if known.
    pub fn get(&self, id: &str) -> Option<Room> {
        self.rooms.get(id).cloned()
    }

    /// The client's assigned private room, if any.
    pub fn private_room_id(&self) -> Option<&str> {
        self.private_room_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_then_ack_then_unsubscribe_then_ack() {
        let mut registry = RoomRegistry::new();
        registry.seed(
            vec![Room {
                id: "r-1".into(),
                name: Some("general".into()),
                is_public: Some(true),
                description: None,
            }],
            Some("pr-1".into()),
        );
        assert_eq!(registry.private_room_id(), Some("pr-1"));

        registry.set_subscribed(vec!["r-1".to_string()]);
        assert_eq!(registry.subscribed(), vec!["r-1".to_string()]);

        registry.set_subscribed(vec![]);
        assert!(registry.subscribed().is_empty());
    }
}
