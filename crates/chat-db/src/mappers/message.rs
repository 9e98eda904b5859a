//! Message entity <-> model mapper

use chat_core::entities::{
    AttachmentRef, FileType, Message, MessageTarget, NewMessage, ReactionSet, ReadReceipt,
    DEFAULT_ROOM,
};
use chat_core::value_objects::Snowflake;

use crate::models::{MessageModel, ReadReceiptModel};

/// Convert MessageModel to Message entity (without reactions or reads)
impl From<MessageModel> for Message {
    fn from(model: MessageModel) -> Self {
        let target = match (model.is_private, model.recipient_id) {
            (true, Some(recipient_id)) => MessageTarget::Direct {
                recipient_id: Snowflake::new(recipient_id),
            },
            _ => MessageTarget::Room(model.room.unwrap_or_else(|| DEFAULT_ROOM.to_string())),
        };

        let attachment = model.file_url.map(|file_url| AttachmentRef {
            file_url,
            file_type: model.file_type.as_deref().and_then(FileType::from_stored),
        });

        Message {
            id: Snowflake::new(model.id),
            sender_id: Snowflake::new(model.sender_id),
            target,
            content: model.content,
            attachment,
            reactions: ReactionSet::new(),
            read_by: Vec::new(),
            created_at: model.created_at,
        }
    }
}

impl From<ReadReceiptModel> for ReadReceipt {
    fn from(model: ReadReceiptModel) -> Self {
        ReadReceipt::new(Snowflake::new(model.user_id), model.read_at)
    }
}

/// Assemble a full message from its row plus reaction and read rows
pub fn message_with_parts(
    model: MessageModel,
    reactions: ReactionSet,
    reads: Vec<ReadReceiptModel>,
) -> Message {
    let mut message = Message::from(model);
    message.reactions = reactions;
    message.read_by = reads.into_iter().map(ReadReceipt::from).collect();
    message
}

/// Values for inserting a new message row
pub struct MessageInsert<'a> {
    pub id: i64,
    pub sender_id: i64,
    pub room: Option<&'a str>,
    pub recipient_id: Option<i64>,
    pub is_private: bool,
    pub content: &'a str,
    pub file_url: Option<&'a str>,
    pub file_type: Option<&'static str>,
}

impl<'a> MessageInsert<'a> {
    pub fn new(id: Snowflake, message: &'a NewMessage) -> Self {
        let (room, recipient_id) = match &message.target {
            MessageTarget::Room(room) => (Some(room.as_str()), None),
            MessageTarget::Direct { recipient_id } => (None, Some(recipient_id.into_inner())),
        };
        let attachment = message.attachment.as_ref();

        Self {
            id: id.into_inner(),
            sender_id: message.sender_id.into_inner(),
            room,
            recipient_id,
            is_private: recipient_id.is_some(),
            content: &message.content,
            file_url: attachment.map(|a| a.file_url.as_str()),
            file_type: attachment.and_then(|a| a.file_type).map(FileType::as_str),
        }
    }
}
