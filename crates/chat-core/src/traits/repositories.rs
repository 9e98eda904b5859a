//! Repository traits (ports) - define the interface for data access
//!
//! The real-time layer never owns durable storage. It persists and loads
//! through these traits; the infrastructure layer provides the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{Message, NewMessage, Presence, ReactionSet, UserSummary};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// User Repository
// ============================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user's display information by ID
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<UserSummary>>;

    /// Mirror an online/offline transition
    async fn update_presence(&self, presence: &Presence) -> RepoResult<()>;
}

// ============================================================================
// Message Repository
// ============================================================================

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a new message, assigning its id and creation time
    async fn create(&self, message: NewMessage) -> RepoResult<Message>;

    /// Find message by ID, with reactions and read receipts
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>>;

    /// Replace the stored reaction set of a message
    async fn save_reactions(&self, id: Snowflake, reactions: &ReactionSet) -> RepoResult<()>;

    /// Record a first read. Returns `false` if the user had already read the message.
    async fn append_read_receipt(
        &self,
        id: Snowflake,
        user_id: Snowflake,
        read_at: DateTime<Utc>,
    ) -> RepoResult<bool>;

    /// Private messages from `sender_id` to `recipient_id` not yet read by the recipient
    async fn count_unread(&self, recipient_id: Snowflake, sender_id: Snowflake) -> RepoResult<i64>;
}
