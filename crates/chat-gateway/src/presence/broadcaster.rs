//! Presence broadcaster
//!
//! Owns the online/offline transitions of users. Transitions of one user are
//! serialized; the registry decides which connection is current.

use crate::broadcast::Fanout;
use crate::connection::{Connection, ConnectionRegistry, ConnectionState};
use crate::events::{StatusChangePayload, ServerEvent};
use crate::protocol::CloseCode;
use chat_core::{Presence, Snowflake, UserRepository};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    users: Arc<dyn UserRepository>,
    /// Last known presence per user
    presence: DashMap<Snowflake, Presence>,
    /// Per-user lock held for the duration of a transition
    transitions: DashMap<Snowflake, Arc<Mutex<()>>>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, users: Arc<dyn UserRepository>) -> Self {
        Self {
            registry,
            users,
            presence: DashMap::new(),
            transitions: DashMap::new(),
        }
    }

    fn transition_lock(&self, user_id: Snowflake) -> Arc<Mutex<()>> {
        self.transitions.entry(user_id).or_default().clone()
    }

    /// Bring a connection online
    ///
    /// Registers it, closes the connection it supersedes, mirrors the status to
    /// the store and announces it to every connected user. Returns the
    /// superseded connection, if any.
    pub async fn connect(&self, connection: &Arc<Connection>) -> Option<Arc<Connection>> {
        let user_id = connection.user_id();
        let lock = self.transition_lock(user_id);
        let _guard = lock.lock().await;

        let superseded = self.registry.register(connection.clone());
        if let Some(old) = &superseded {
            tracing::info!(
                user_id = %user_id,
                old_connection = %old.id(),
                new_connection = %connection.id(),
                "Connection superseded"
            );
            old.close(Some(CloseCode::SessionReplaced));
        }

        let presence = Presence::online(user_id);
        self.presence.insert(user_id, presence);
        self.store(&presence).await;

        let event = ServerEvent::UserStatusChange(StatusChangePayload {
            user_id,
            status: presence.status,
            username: connection.username().to_string(),
            last_seen: None,
        });
        Fanout::emit(&self.registry.all(), &event, None);

        connection.set_state(ConnectionState::Online);
        tracing::info!(user_id = %user_id, connection_id = %connection.id(), "User online");

        superseded
    }

    /// Take a connection offline
    ///
    /// `on_offline` runs under the user's transition lock, right after the
    /// connection is unregistered, so a reconnect cannot interleave with it.
    /// Returns `false` without side effects if the connection is no longer the
    /// user's current one (already disconnected, or superseded).
    pub async fn disconnect<F>(&self, connection: &Connection, on_offline: F) -> bool
    where
        F: FnOnce(Snowflake) + Send,
    {
        let user_id = connection.user_id();
        let lock = self.transition_lock(user_id);
        let _guard = lock.lock().await;

        connection.set_state(ConnectionState::Offline);

        if !self.registry.unregister(connection) {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection.id(),
                "Stale disconnect ignored"
            );
            return false;
        }

        on_offline(user_id);

        let presence = Presence::offline(user_id);
        self.presence.insert(user_id, presence);
        self.store(&presence).await;

        let event = ServerEvent::UserStatusChange(StatusChangePayload {
            user_id,
            status: presence.status,
            username: connection.username().to_string(),
            last_seen: Some(presence.last_seen),
        });
        Fanout::emit(&self.registry.all(), &event, None);

        tracing::info!(user_id = %user_id, connection_id = %connection.id(), "User offline");
        true
    }

    /// Last known presence of a user
    pub fn status_of(&self, user_id: Snowflake) -> Option<Presence> {
        self.presence.get(&user_id).map(|entry| *entry.value())
    }

    pub fn clear(&self) {
        self.presence.clear();
        self.transitions.clear();
    }

    async fn store(&self, presence: &Presence) {
        if let Err(e) = self.users.update_presence(presence).await {
            tracing::warn!(
                user_id = %presence.user_id,
                status = %presence.status.as_str(),
                error = %e,
                "Failed to persist presence"
            );
        }
    }
}

impl std::fmt::Debug for PresenceBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceBroadcaster")
            .field("known", &self.presence.len())
            .finish_non_exhaustive()
    }
}
