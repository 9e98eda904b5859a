//! Gateway events
//!
//! Defines all events sent by the gateway to clients.

mod payloads;
mod server_event;

pub use payloads::{
    reaction_list, ErrorPayload, MessagePayload, NotificationKind, NotificationPayload,
    ReactionPayload, ReactionUpdatedPayload, ReadByPayload, ReadReceiptPayload,
    RoomPresencePayload, StatusChangePayload, TypingPayload, TypingStoppedPayload, UserPayload,
};
pub use server_event::ServerEvent;
