//! Connection registry
//!
//! Maps each online user to their live connection. A user has at most one
//! connection; registering again supersedes the previous one.

use super::Connection;
use chat_core::Snowflake;
use dashmap::DashMap;
use std::sync::Arc;

/// Live connections keyed by user ID
///
/// Uses `DashMap` so mutations for one user only lock that user's shard.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Snowflake, Arc<Connection>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a connection for its user
    ///
    /// Returns the connection it superseded, if any.
    pub fn register(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let user_id = connection.user_id();
        let connection_id = connection.id().to_string();

        let superseded = self
            .connections
            .insert(user_id, connection)
            .filter(|old| old.id() != connection_id);

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            superseded = superseded.is_some(),
            "Connection registered"
        );

        superseded
    }

    /// Remove a connection
    ///
    /// Only removes the entry if it still belongs to this connection, so a stale
    /// disconnect cannot evict a newer connection. Idempotent.
    pub fn unregister(&self, connection: &Connection) -> bool {
        let removed = self
            .connections
            .remove_if(&connection.user_id(), |_, current| {
                current.id() == connection.id()
            })
            .is_some();

        if removed {
            tracing::debug!(
                user_id = %connection.user_id(),
                connection_id = %connection.id(),
                "Connection unregistered"
            );
        }

        removed
    }

    /// Get the live connection of a user
    pub fn lookup(&self, user_id: Snowflake) -> Option<Arc<Connection>> {
        self.connections.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn is_online(&self, user_id: Snowflake) -> bool {
        self.connections.contains_key(&user_id)
    }

    /// IDs of every user with a live connection
    pub fn list_online(&self) -> Vec<Snowflake> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Point-in-time copy of every live connection
    pub fn all(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn clear(&self) {
        self.connections.clear();
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("online", &self.connections.len())
            .finish()
    }
}
