//! Outbound event envelope

use chat_core::Snowflake;
use serde::Serialize;

use super::payloads::{
    ErrorPayload, MessagePayload, NotificationPayload, ReactionUpdatedPayload,
    ReadReceiptPayload, RoomPresencePayload, StatusChangePayload, TypingPayload,
    TypingStoppedPayload,
};

/// Events sent by the gateway
///
/// Serialized as `{"event": "<kebab-name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    // Connection
    /// Users online at the moment of connecting; sent to the new connection only
    OnlineUsers(Vec<Snowflake>),
    HeartbeatAck,

    // Rooms
    UserJoined(RoomPresencePayload),
    UserLeft(RoomPresencePayload),

    // Messages
    NewMessage(MessagePayload),
    NewPrivateMessage(MessagePayload),
    Notification(NotificationPayload),

    // Typing
    UserTyping(TypingPayload),
    UserStoppedTyping(TypingStoppedPayload),

    // Reactions and receipts
    ReactionUpdated(ReactionUpdatedPayload),
    MessageReadReceipt(ReadReceiptPayload),

    // Presence
    UserStatusChange(StatusChangePayload),

    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Wire name of the event
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OnlineUsers(_) => "online-users",
            Self::HeartbeatAck => "heartbeat-ack",
            Self::UserJoined(_) => "user-joined",
            Self::UserLeft(_) => "user-left",
            Self::NewMessage(_) => "new-message",
            Self::NewPrivateMessage(_) => "new-private-message",
            Self::Notification(_) => "notification",
            Self::UserTyping(_) => "user-typing",
            Self::UserStoppedTyping(_) => "user-stopped-typing",
            Self::ReactionUpdated(_) => "reaction-updated",
            Self::MessageReadReceipt(_) => "message-read-receipt",
            Self::UserStatusChange(_) => "user-status-change",
            Self::Error(_) => "error",
        }
    }

    /// Serialize to a text frame
    ///
    /// # Errors
    /// Returns an error if serialization fails
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
