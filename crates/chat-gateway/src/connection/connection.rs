//! Individual WebSocket connection
//!
//! Represents a single authenticated WebSocket connection and its state.

use crate::events::ServerEvent;
use crate::protocol::CloseCode;
use chat_core::{Snowflake, UserSummary};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};

/// Connection state
///
/// Authentication happens on the HTTP upgrade request, so a `Connection` only
/// exists once its identity is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Identity verified, not yet announced
    Authenticated,
    /// Registered and announced to peers
    Online,
    /// Transport gone; cleanup has run or is running
    Offline,
}

/// A single WebSocket connection
pub struct Connection {
    /// Unique connection ID
    id: String,

    /// Authenticated user
    user: UserSummary,

    state: RwLock<ConnectionState>,

    /// Outbound queue drained by the socket's send task
    sender: mpsc::Sender<ServerEvent>,

    /// Rooms this connection has joined
    rooms: Mutex<HashSet<String>>,

    /// Last frame received
    last_heartbeat: Mutex<Instant>,

    closing: AtomicBool,
    close_code: Mutex<Option<CloseCode>>,
    close_notify: Notify,

    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(user: UserSummary, sender: mpsc::Sender<ServerEvent>) -> Arc<Self> {
        Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user,
            state: RwLock::new(ConnectionState::Authenticated),
            sender,
            rooms: Mutex::new(HashSet::new()),
            last_heartbeat: Mutex::new(Instant::now()),
            closing: AtomicBool::new(false),
            close_code: Mutex::new(None),
            close_notify: Notify::new(),
            created_at: Instant::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user(&self) -> &UserSummary {
        &self.user
    }

    pub fn user_id(&self) -> Snowflake {
        self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Queue an event for this connection
    ///
    /// Never waits: a full or closed queue drops the event. Returns whether it was queued.
    pub fn deliver(&self, event: ServerEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    user_id = %self.user.id,
                    event = event.name(),
                    "Outbound queue full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!(connection_id = %self.id, "Outbound queue closed");
                false
            }
        }
    }

    /// Ask the socket to close. Only the first request counts.
    pub fn close(&self, code: Option<CloseCode>) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }

        *self.close_code.lock() = code;
        self.close_notify.notify_one();
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub fn close_code(&self) -> Option<CloseCode> {
        *self.close_code.lock()
    }

    /// Resolves once `close` has been called
    pub async fn closed(&self) {
        if self.is_closing() {
            return;
        }
        self.close_notify.notified().await;
    }

    /// Record a heartbeat received
    pub fn record_heartbeat(&self) {
        *self.last_heartbeat.lock() = Instant::now();
    }

    /// Get time since last heartbeat
    pub fn time_since_heartbeat(&self) -> Duration {
        self.last_heartbeat.lock().elapsed()
    }

    /// Returns `true` if the room was not already joined
    pub(crate) fn add_room(&self, room: &str) -> bool {
        self.rooms.lock().insert(room.to_string())
    }

    pub(crate) fn remove_room(&self, room: &str) -> bool {
        self.rooms.lock().remove(room)
    }

    /// Drain the joined rooms
    pub(crate) fn take_rooms(&self) -> Vec<String> {
        self.rooms.lock().drain().collect()
    }

    pub fn rooms(&self) -> Vec<String> {
        self.rooms.lock().iter().cloned().collect()
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.rooms.lock().contains(room)
    }

    /// Get connection age
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user.id)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish()
    }
}
