//! Room membership manager
//!
//! Tracks which connections are in which named room.

use crate::connection::Connection;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Room name to member connections, keyed by connection ID
#[derive(Default)]
pub struct RoomManager {
    rooms: DashMap<String, HashMap<String, Arc<Connection>>>,
}

impl RoomManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Add a connection to a room
    ///
    /// Returns `true` if the connection was not already a member.
    pub fn join(&self, connection: &Arc<Connection>, room: &str) -> bool {
        let joined = self
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection.id().to_string(), connection.clone())
            .is_none();

        connection.add_room(room);

        if joined {
            tracing::debug!(
                connection_id = %connection.id(),
                user_id = %connection.user_id(),
                room = %room,
                "Joined room"
            );
        }

        joined
    }

    /// Remove a connection from a room
    ///
    /// Returns `true` if the connection was a member. Empty rooms are dropped.
    pub fn leave(&self, connection: &Connection, room: &str) -> bool {
        let left = self
            .rooms
            .get_mut(room)
            .is_some_and(|mut members| members.remove(connection.id()).is_some());

        if left {
            self.rooms.remove_if(room, |_, members| members.is_empty());
            tracing::debug!(
                connection_id = %connection.id(),
                user_id = %connection.user_id(),
                room = %room,
                "Left room"
            );
        }

        connection.remove_room(room);
        left
    }

    /// Remove a connection from every room it joined
    ///
    /// Returns the rooms it was removed from.
    pub fn leave_all(&self, connection: &Connection) -> Vec<String> {
        connection
            .take_rooms()
            .into_iter()
            .filter(|room| self.leave(connection, room))
            .collect()
    }

    /// Point-in-time copy of a room's members
    pub fn members_of(&self, room: &str) -> Vec<Arc<Connection>> {
        self.rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, room: &str, connection: &Connection) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains_key(connection.id()))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn clear(&self) {
        self.rooms.clear();
    }
}

impl std::fmt::Debug for RoomManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomManager")
            .field("rooms", &self.rooms.len())
            .finish()
    }
}
