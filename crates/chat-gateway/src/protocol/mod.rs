//! Gateway protocol definitions
//!
//! Inbound client events, their payloads, and close codes.
//! Every frame is JSON text: `{"event": "<kebab-name>", "data": {...}}`.

mod client_event;
mod close_codes;
mod payloads;

pub use client_event::ClientEvent;
pub use close_codes::CloseCode;
pub use payloads::{
    validation_message, AddReactionPayload, MessageReadPayload, RoomPayload,
    SendMessagePayload, SendPrivateMessagePayload, TypingTarget,
};
