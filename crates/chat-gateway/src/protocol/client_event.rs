//! Inbound event envelope

use serde::Deserialize;

use super::payloads::{
    AddReactionPayload, MessageReadPayload, RoomPayload, SendMessagePayload,
    SendPrivateMessagePayload, TypingTarget,
};

/// Events a client may send
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(RoomPayload),
    LeaveRoom(RoomPayload),
    SendMessage(SendMessagePayload),
    SendPrivateMessage(SendPrivateMessagePayload),
    TypingStart(TypingTarget),
    TypingStop(TypingTarget),
    AddReaction(AddReactionPayload),
    MessageRead(MessageReadPayload),
    Heartbeat,
}

impl ClientEvent {
    /// Parse a text frame
    ///
    /// # Errors
    /// Returns an error if the frame is not a known event with a well-formed payload
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name, for logging
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join-room",
            Self::LeaveRoom(_) => "leave-room",
            Self::SendMessage(_) => "send-message",
            Self::SendPrivateMessage(_) => "send-private-message",
            Self::TypingStart(_) => "typing-start",
            Self::TypingStop(_) => "typing-stop",
            Self::AddReaction(_) => "add-reaction",
            Self::MessageRead(_) => "message-read",
            Self::Heartbeat => "heartbeat",
        }
    }
}
