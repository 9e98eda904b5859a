//! Domain entities - core business objects

mod message;
mod reaction;
mod read_receipt;
mod user;

pub use message::{
    AttachmentRef, FileType, Message, MessageTarget, NewMessage, DEFAULT_ROOM, MAX_CONTENT_LENGTH,
};
pub use reaction::{Reaction, ReactionSet};
pub use read_receipt::ReadReceipt;
pub use user::{Presence, UserSummary};
