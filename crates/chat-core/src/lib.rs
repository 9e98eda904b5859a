//! # chat-core
//!
//! Domain layer containing entities, value objects and repository traits.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    AttachmentRef, FileType, Message, MessageTarget, NewMessage, Presence, Reaction, ReactionSet,
    ReadReceipt, UserSummary, DEFAULT_ROOM, MAX_CONTENT_LENGTH,
};
pub use error::DomainError;
pub use traits::{MessageRepository, RepoResult, UserRepository};
pub use value_objects::{
    ReactionKind, ReactionKindParseError, Snowflake, SnowflakeGenerator, SnowflakeParseError,
    UserStatus,
};
