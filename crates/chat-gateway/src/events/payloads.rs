//! Event payload definitions
//!
//! Data carried by each server-to-client event. Field names are camelCase on the wire.

use chat_core::{
    FileType, Message, Reaction, ReactionKind, ReactionSet, ReadReceipt, Snowflake, UserStatus,
    UserSummary,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

// === User Payload ===

/// Display information for a user
#[derive(Debug, Clone, Serialize)]
pub struct UserPayload {
    pub id: Snowflake,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<&UserSummary> for UserPayload {
    fn from(user: &UserSummary) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

// === Room Events ===

/// USER_JOINED / USER_LEFT payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPresencePayload {
    pub user_id: Snowflake,
    pub username: String,
    pub room: String,
}

impl RoomPresencePayload {
    pub fn new(user: &UserSummary, room: impl Into<String>) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            room: room.into(),
        }
    }
}

// === Message Events ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    pub user_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
}

impl From<&Reaction> for ReactionPayload {
    fn from(reaction: &Reaction) -> Self {
        Self {
            user_id: reaction.user_id,
            kind: reaction.kind,
        }
    }
}

/// Ordered list form of a reaction set
pub fn reaction_list(reactions: &ReactionSet) -> Vec<ReactionPayload> {
    reactions.iter().map(ReactionPayload::from).collect()
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadByPayload {
    pub user_id: Snowflake,
    pub read_at: DateTime<Utc>,
}

impl From<&ReadReceipt> for ReadByPayload {
    fn from(receipt: &ReadReceipt) -> Self {
        Self {
            user_id: receipt.user_id,
            read_at: receipt.read_at,
        }
    }
}

/// NEW_MESSAGE / NEW_PRIVATE_MESSAGE payload
///
/// The stored message together with the sender's display info. `timestamp`
/// repeats the creation time for clients that sort on it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: Snowflake,
    pub sender: UserPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<UserPayload>,
    pub is_private: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<FileType>,
    pub reactions: Vec<ReactionPayload>,
    pub read_by: Vec<ReadByPayload>,
    pub created_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl MessagePayload {
    pub fn new(message: &Message, sender: &UserSummary, recipient: Option<&UserSummary>) -> Self {
        let attachment = message.attachment.as_ref();

        Self {
            id: message.id,
            sender: UserPayload::from(sender),
            room: message.room().map(str::to_string),
            recipient_id: message.recipient_id(),
            recipient: recipient.map(UserPayload::from),
            is_private: message.is_private(),
            content: message.content.clone(),
            file_url: attachment.map(|a| a.file_url.clone()),
            file_type: attachment.and_then(|a| a.file_type),
            reactions: reaction_list(&message.reactions),
            read_by: message.read_by.iter().map(ReadByPayload::from).collect(),
            created_at: message.created_at,
            timestamp: message.created_at,
        }
    }
}

/// Kind of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    NewMessage,
    PrivateMessage,
}

/// NOTIFICATION payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// "<username>: <preview>"
    pub message: String,
    /// Sender's username
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<i64>,
}

// === Typing Events ===

/// USER_TYPING payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: Snowflake,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

/// USER_STOPPED_TYPING payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStoppedPayload {
    pub user_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

// === Reaction / Read Events ===

/// REACTION_UPDATED payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdatedPayload {
    pub message_id: Snowflake,
    pub reactions: Vec<ReactionPayload>,
}

/// MESSAGE_READ_RECEIPT payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptPayload {
    pub message_id: Snowflake,
    /// Reader's user id
    pub read_by: Snowflake,
    /// Reader's username
    pub username: String,
}

// === Presence Events ===

/// USER_STATUS_CHANGE payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangePayload {
    pub user_id: Snowflake,
    pub status: UserStatus,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}
