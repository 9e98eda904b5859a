//! Gateway state
//!
//! Application state for the gateway server.

use crate::connection::ConnectionRegistry;
use crate::handlers::TypingHandler;
use crate::presence::PresenceBroadcaster;
use crate::protocol::CloseCode;
use crate::rooms::RoomManager;
use crate::typing::TypingTracker;
use chat_common::{JwtService, RealtimeConfig};
use chat_core::{MessageRepository, Snowflake, UserRepository};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

/// Gateway application state
///
/// Owns every in-memory map of the coordinator. Built once at startup and torn
/// down by [`GatewayState::shutdown`].
#[derive(Clone)]
pub struct GatewayState {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomManager>,
    typing: Arc<TypingTracker>,
    presence: Arc<PresenceBroadcaster>,
    messages: Arc<dyn MessageRepository>,
    users: Arc<dyn UserRepository>,
    jwt: Arc<JwtService>,
    realtime: RealtimeConfig,
    /// Per-message locks around reaction load/save
    reaction_locks: Arc<DashMap<Snowflake, Arc<AsyncMutex<()>>>>,
    /// Task turning typing timer expiries into stop notifications
    expiry_worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl GatewayState {
    /// Create the state and start its background tasks
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        users: Arc<dyn UserRepository>,
        jwt: JwtService,
        realtime: RealtimeConfig,
    ) -> Self {
        let registry = ConnectionRegistry::new_shared();
        let rooms = RoomManager::new_shared();
        let (typing, expired_rx) = TypingTracker::new(realtime.typing_ttl());
        let typing = Arc::new(typing);
        let presence = Arc::new(PresenceBroadcaster::new(registry.clone(), users.clone()));

        let expiry_worker = TypingHandler::spawn_expiry_worker(
            expired_rx,
            typing.clone(),
            registry.clone(),
            rooms.clone(),
        );

        Self {
            registry,
            rooms,
            typing,
            presence,
            messages,
            users,
            jwt: Arc::new(jwt),
            realtime,
            reaction_locks: Arc::new(DashMap::new()),
            expiry_worker: Arc::new(Mutex::new(Some(expiry_worker))),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub fn presence(&self) -> &PresenceBroadcaster {
        &self.presence
    }

    pub fn messages(&self) -> &dyn MessageRepository {
        self.messages.as_ref()
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn realtime(&self) -> &RealtimeConfig {
        &self.realtime
    }

    /// Lock serializing reaction updates of one message
    pub(crate) fn reaction_lock(&self, message_id: Snowflake) -> Arc<AsyncMutex<()>> {
        self.reaction_locks.entry(message_id).or_default().clone()
    }

    /// Hand back a lock from [`Self::reaction_lock`], dropping it once unused
    pub(crate) fn release_reaction_lock(&self, message_id: Snowflake, lock: Arc<AsyncMutex<()>>) {
        drop(lock);
        self.reaction_locks
            .remove_if(&message_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Stop background work, close every connection and drop all in-memory state
    pub fn shutdown(&self) {
        if let Some(worker) = self.expiry_worker.lock().take() {
            worker.abort();
        }

        self.typing.clear();

        let connections = self.registry.all();
        for connection in &connections {
            connection.close(Some(CloseCode::ServerShutdown));
        }

        self.registry.clear();
        self.rooms.clear();
        self.presence.clear();
        self.reaction_locks.clear();

        tracing::info!(closed = connections.len(), "Gateway state cleared");
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("registry", &self.registry)
            .field("rooms", &self.rooms)
            .field("typing", &self.typing)
            .field("realtime", &self.realtime)
            .finish_non_exhaustive()
    }
}
