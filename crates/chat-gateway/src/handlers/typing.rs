//! typing-start / typing-stop, and typing expiry

use super::HandlerResult;
use crate::broadcast::Fanout;
use crate::connection::{Connection, ConnectionRegistry};
use crate::events::{ServerEvent, TypingPayload, TypingStoppedPayload};
use crate::protocol::TypingTarget;
use crate::rooms::RoomManager;
use crate::server::GatewayState;
use crate::typing::{TypingExpiry, TypingKey, TypingTracker};
use chat_core::{Snowflake, UserSummary};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct TypingHandler;

impl TypingHandler {
    /// Start (or refresh) a typing indicator. The audience hears about new entries only.
    pub fn start(
        state: &GatewayState,
        connection: &Arc<Connection>,
        target: &TypingTarget,
    ) -> HandlerResult<()> {
        let key = target.key();
        let user = connection.user();

        if key == TypingKey::Direct(user.id) {
            return Ok(());
        }

        if state.typing().start(key.clone(), user.id) {
            Self::notify_typing(state.registry(), state.rooms(), user, &key);
        }

        Ok(())
    }

    /// Stop a typing indicator. Nothing is sent if it was not active.
    pub fn stop(
        state: &GatewayState,
        connection: &Arc<Connection>,
        target: &TypingTarget,
    ) -> HandlerResult<()> {
        let key = target.key();
        let user_id = connection.user_id();

        if state.typing().stop(&key, user_id) {
            Self::notify_stopped(state.registry(), state.rooms(), user_id, &key);
        }

        Ok(())
    }

    /// Clear every indicator of a user that went offline
    pub fn clear_user(state: &GatewayState, user_id: Snowflake) {
        for key in state.typing().clear_user(user_id) {
            Self::notify_stopped(state.registry(), state.rooms(), user_id, &key);
        }
    }

    /// Consume timer expiries, sending one stop notification per expired entry
    pub fn spawn_expiry_worker(
        mut expired_rx: mpsc::UnboundedReceiver<TypingExpiry>,
        typing: Arc<TypingTracker>,
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomManager>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(expiry) = expired_rx.recv().await {
                if typing.expire(&expiry) {
                    tracing::trace!(
                        user_id = %expiry.user_id,
                        key = ?expiry.key,
                        "Typing indicator expired"
                    );
                    Self::notify_stopped(&registry, &rooms, expiry.user_id, &expiry.key);
                }
            }
        })
    }

    fn notify_typing(
        registry: &ConnectionRegistry,
        rooms: &RoomManager,
        user: &UserSummary,
        key: &TypingKey,
    ) {
        let (payload, audience) = match key {
            TypingKey::Room(room) => (
                TypingPayload {
                    user_id: user.id,
                    username: user.username.clone(),
                    room: Some(room.clone()),
                    is_private: None,
                },
                rooms.members_of(room),
            ),
            TypingKey::Direct(counterpart) => (
                TypingPayload {
                    user_id: user.id,
                    username: user.username.clone(),
                    room: None,
                    is_private: Some(true),
                },
                registry.lookup(*counterpart).into_iter().collect(),
            ),
        };

        Fanout::emit(&audience, &ServerEvent::UserTyping(payload), Some(user.id));
    }

    fn notify_stopped(
        registry: &ConnectionRegistry,
        rooms: &RoomManager,
        user_id: Snowflake,
        key: &TypingKey,
    ) {
        let (room, audience) = match key {
            TypingKey::Room(room) => (Some(room.clone()), rooms.members_of(room)),
            TypingKey::Direct(counterpart) => {
                (None, registry.lookup(*counterpart).into_iter().collect())
            }
        };

        let event = ServerEvent::UserStoppedTyping(TypingStoppedPayload { user_id, room });
        Fanout::emit(&audience, &event, Some(user_id));
    }
}
