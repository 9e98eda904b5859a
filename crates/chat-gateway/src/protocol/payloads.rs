//! Client payload definitions
//!
//! Payloads of client-to-server events. Field-level limits are declared with
//! `validator`; checks that span fields live on the payload itself.

use chat_core::{
    AttachmentRef, FileType, MessageTarget, NewMessage, ReactionKind, ReactionKindParseError,
    Snowflake,
};
use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::typing::TypingKey;

/// Payload for `join-room` and `leave-room`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RoomPayload {
    #[validate(length(min = 1, max = 100, message = "Room name must be 1-100 characters"))]
    pub room: String,
}

/// Payload for `send-message`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[serde(default)]
    #[validate(length(max = 2000, message = "Message must be at most 2000 characters"))]
    pub content: String,

    /// Defaults to the global room
    #[validate(length(max = 100, message = "Room name must be at most 100 characters"))]
    pub room: Option<String>,

    pub file_url: Option<String>,
    pub file_type: Option<FileType>,
}

impl SendMessagePayload {
    #[must_use]
    pub fn into_new_message(self, sender_id: Snowflake) -> NewMessage {
        NewMessage {
            sender_id,
            target: MessageTarget::room_or_default(self.room.as_deref()),
            content: self.content,
            attachment: attachment(self.file_url, self.file_type),
        }
    }
}

/// Payload for `send-private-message`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendPrivateMessagePayload {
    #[serde(default)]
    #[validate(length(max = 2000, message = "Message must be at most 2000 characters"))]
    pub content: String,

    pub recipient_id: Snowflake,

    pub file_url: Option<String>,
    pub file_type: Option<FileType>,
}

impl SendPrivateMessagePayload {
    #[must_use]
    pub fn into_new_message(self, sender_id: Snowflake) -> NewMessage {
        NewMessage {
            sender_id,
            target: MessageTarget::Direct {
                recipient_id: self.recipient_id,
            },
            content: self.content,
            attachment: attachment(self.file_url, self.file_type),
        }
    }
}

fn attachment(file_url: Option<String>, file_type: Option<FileType>) -> Option<AttachmentRef> {
    file_url
        .filter(|url| !url.trim().is_empty())
        .map(|file_url| AttachmentRef { file_url, file_type })
}

/// Payload for `typing-start` and `typing-stop`
///
/// A recipient id selects a direct conversation; otherwise the room is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingTarget {
    pub room: Option<String>,
    pub recipient_id: Option<Snowflake>,
}

impl TypingTarget {
    #[must_use]
    pub fn key(&self) -> TypingKey {
        match self.recipient_id {
            Some(recipient_id) => TypingKey::Direct(recipient_id),
            None => match MessageTarget::room_or_default(self.room.as_deref()) {
                MessageTarget::Room(room) => TypingKey::Room(room),
                MessageTarget::Direct { recipient_id } => TypingKey::Direct(recipient_id),
            },
        }
    }
}

/// Payload for `add-reaction`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReactionPayload {
    pub message_id: Snowflake,
    pub reaction_type: String,
}

impl AddReactionPayload {
    /// Parse the reaction name against the fixed palette
    ///
    /// # Errors
    /// Returns an error for names outside the palette
    pub fn kind(&self) -> Result<ReactionKind, ReactionKindParseError> {
        self.reaction_type.parse()
    }
}

/// Payload for `message-read`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadPayload {
    pub message_id: Snowflake,
}

/// First human-readable message out of a set of validation errors
#[must_use]
pub fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errors| errors.iter())
        .find_map(|e| e.message.as_ref().map(ToString::to_string))
        .unwrap_or_else(|| errors.to_string())
}
