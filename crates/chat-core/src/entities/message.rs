//! Message entity - a chat message posted to a room or sent privately

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reaction::ReactionSet;
use super::read_receipt::ReadReceipt;
use crate::value_objects::Snowflake;

/// Room used whenever a client does not name one
pub const DEFAULT_ROOM: &str = "global";

/// Maximum message content length in characters
pub const MAX_CONTENT_LENGTH: usize = 2000;

/// Where a message was sent: a named room, or privately to one user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageTarget {
    Room(String),
    Direct { recipient_id: Snowflake },
}

impl MessageTarget {
    /// Room target, falling back to [`DEFAULT_ROOM`] when none was given
    pub fn room_or_default(room: Option<&str>) -> Self {
        let room = room.map(str::trim).filter(|r| !r.is_empty());
        Self::Room(room.unwrap_or(DEFAULT_ROOM).to_string())
    }
}

/// Kind of uploaded attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    File,
}

impl FileType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::File => "file",
        }
    }

    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

/// Reference to an already-uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub file_url: String,
    pub file_type: Option<FileType>,
}

/// Input for creating a message through the message store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: Snowflake,
    pub target: MessageTarget,
    pub content: String,
    pub attachment: Option<AttachmentRef>,
}

impl NewMessage {
    /// A message needs either text or an attachment
    pub fn has_body(&self) -> bool {
        !self.content.trim().is_empty() || self.attachment.is_some()
    }
}

/// Persisted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Snowflake,
    pub sender_id: Snowflake,
    pub target: MessageTarget,
    pub content: String,
    pub attachment: Option<AttachmentRef>,
    pub reactions: ReactionSet,
    pub read_by: Vec<ReadReceipt>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a freshly stored message from its creation input
    pub fn from_new(id: Snowflake, new: NewMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sender_id: new.sender_id,
            target: new.target,
            content: new.content,
            attachment: new.attachment,
            reactions: ReactionSet::new(),
            read_by: Vec::new(),
            created_at,
        }
    }

    /// Room name for room messages
    pub fn room(&self) -> Option<&str> {
        match &self.target {
            MessageTarget::Room(room) => Some(room),
            MessageTarget::Direct { .. } => None,
        }
    }

    /// Recipient for private messages
    pub fn recipient_id(&self) -> Option<Snowflake> {
        match self.target {
            MessageTarget::Direct { recipient_id } => Some(recipient_id),
            MessageTarget::Room(_) => None,
        }
    }

    #[inline]
    pub fn is_private(&self) -> bool {
        matches!(self.target, MessageTarget::Direct { .. })
    }

    /// The other participant of a private message, seen from `user_id`
    pub fn counterpart_of(&self, user_id: Snowflake) -> Option<Snowflake> {
        let recipient_id = self.recipient_id()?;
        Some(if self.sender_id == user_id {
            recipient_id
        } else {
            self.sender_id
        })
    }

    /// First `max_chars` characters of the content (for notifications)
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.content.char_indices().nth(max_chars) {
            Some((end, _)) => &self.content[..end],
            None => &self.content,
        }
    }

    pub fn has_read(&self, user_id: Snowflake) -> bool {
        self.read_by.iter().any(|r| r.user_id == user_id)
    }

    /// Record a first read. Returns `false` if `user_id` had already read it.
    pub fn mark_read(&mut self, user_id: Snowflake, at: DateTime<Utc>) -> bool {
        if self.has_read(user_id) {
            return false;
        }
        self.read_by.push(ReadReceipt::new(user_id, at));
        true
    }
}
