//! Event fan-out
//!
//! Delivers one event to a set of connections. Every multicast in the gateway
//! goes through here.

use crate::connection::Connection;
use crate::events::{NotificationKind, NotificationPayload, ServerEvent};
use chat_core::{Message, Snowflake, UserSummary};
use std::sync::Arc;

/// Characters of message content included in a notification
pub const PREVIEW_CHARS: usize = 50;

pub struct Fanout;

impl Fanout {
    /// Deliver `event` to every connection in `audience` except those of `exclude`
    ///
    /// Returns the number of connections the event was queued for.
    pub fn emit<'a, I>(audience: I, event: &ServerEvent, exclude: Option<Snowflake>) -> usize
    where
        I: IntoIterator<Item = &'a Arc<Connection>>,
    {
        let mut delivered = 0;

        for connection in audience {
            if exclude == Some(connection.user_id()) {
                continue;
            }
            if connection.deliver(event.clone()) {
                delivered += 1;
            }
        }

        tracing::trace!(event = event.name(), delivered, "Event fanned out");
        delivered
    }

    /// Send a notification to every connection in `audience` except those of `exclude`
    pub fn notify<'a, I>(
        audience: I,
        exclude: Option<Snowflake>,
        notification: NotificationPayload,
    ) -> usize
    where
        I: IntoIterator<Item = &'a Arc<Connection>>,
    {
        Self::emit(audience, &ServerEvent::Notification(notification), exclude)
    }
}

/// "<username>: <preview>"
fn preview_line(sender: &UserSummary, message: &Message) -> String {
    format!("{}: {}", sender.username, message.preview(PREVIEW_CHARS))
}

impl NotificationPayload {
    /// Notification for a message posted to a room
    pub fn new_message(sender: &UserSummary, message: &Message) -> Self {
        Self {
            kind: NotificationKind::NewMessage,
            message: preview_line(sender, message),
            from: sender.username.clone(),
            from_id: None,
            room: message.room().map(str::to_string),
            unread_count: None,
        }
    }

    /// Notification for a private message
    pub fn private_message(
        sender: &UserSummary,
        message: &Message,
        unread_count: Option<i64>,
    ) -> Self {
        Self {
            kind: NotificationKind::PrivateMessage,
            message: preview_line(sender, message),
            from: sender.username.clone(),
            from_id: Some(sender.id),
            room: None,
            unread_count,
        }
    }
}
