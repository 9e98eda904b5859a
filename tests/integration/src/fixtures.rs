//! Test fixtures
//!
//! In-memory repositories standing in for PostgreSQL, so end-to-end tests
//! run without external services.

use async_trait::async_trait;
use chat_core::{
    DomainError, Message, MessageRepository, MessageTarget, NewMessage, Presence, ReactionSet,
    RepoResult, Snowflake, SnowflakeGenerator, UserRepository, UserSummary,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Counter for unique test users
static USER_COUNTER: AtomicI64 = AtomicI64::new(1);

/// Get a unique user id
pub fn unique_user_id() -> Snowflake {
    Snowflake::new(USER_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// User store backed by a map
#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<HashMap<Snowflake, UserSummary>>,
    presence: Mutex<HashMap<Snowflake, Presence>>,
}

impl InMemoryUsers {
    pub fn insert(&self, user: UserSummary) {
        self.users.lock().insert(user.id, user);
    }

    /// Last presence written for a user
    pub fn presence_of(&self, id: Snowflake) -> Option<Presence> {
        self.presence.lock().get(&id).copied()
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<UserSummary>> {
        Ok(self.users.lock().get(&id).cloned())
    }

    async fn update_presence(&self, presence: &Presence) -> RepoResult<()> {
        if !self.users.lock().contains_key(&presence.user_id) {
            return Err(DomainError::UserNotFound(presence.user_id));
        }
        self.presence.lock().insert(presence.user_id, *presence);
        Ok(())
    }
}

/// Message store backed by a map
pub struct InMemoryMessages {
    messages: Mutex<HashMap<Snowflake, Message>>,
    ids: SnowflakeGenerator,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicU64,
}

impl Default for InMemoryMessages {
    fn default() -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
            ids: SnowflakeGenerator::new(1),
            fail_writes: AtomicBool::new(false),
            read_delay_ms: AtomicU64::new(0),
        }
    }
}

impl InMemoryMessages {
    /// Make every subsequent write fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every lookup by id take at least `delay`
    pub fn delay_reads(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn get(&self, id: Snowflake) -> Option<Message> {
        self.messages.lock().get(&id).cloned()
    }

    /// Private messages addressed to `recipient_id`
    pub fn inbox(&self, recipient_id: Snowflake) -> Vec<Message> {
        self.messages
            .lock()
            .values()
            .filter(|m| m.recipient_id() == Some(recipient_id))
            .cloned()
            .collect()
    }

    fn check_writable(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(DomainError::DatabaseError("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessages {
    async fn create(&self, message: NewMessage) -> RepoResult<Message> {
        self.check_writable()?;

        let message = Message::from_new(self.ids.generate(), message, Utc::now());
        self.messages.lock().insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(self.get(id))
    }

    async fn save_reactions(&self, id: Snowflake, reactions: &ReactionSet) -> RepoResult<()> {
        self.check_writable()?;

        let mut messages = self.messages.lock();
        let message = messages
            .get_mut(&id)
            .ok_or(DomainError::MessageNotFound(id))?;
        message.reactions = reactions.clone();
        Ok(())
    }

    async fn append_read_receipt(
        &self,
        id: Snowflake,
        user_id: Snowflake,
        read_at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        self.check_writable()?;

        let mut messages = self.messages.lock();
        let message = messages
            .get_mut(&id)
            .ok_or(DomainError::MessageNotFound(id))?;
        Ok(message.mark_read(user_id, read_at))
    }

    async fn count_unread(&self, recipient_id: Snowflake, sender_id: Snowflake) -> RepoResult<i64> {
        let count = self
            .messages
            .lock()
            .values()
            .filter(|m| {
                m.sender_id == sender_id
                    && m.target == MessageTarget::Direct { recipient_id }
                    && !m.has_read(recipient_id)
            })
            .count();
        Ok(count as i64)
    }
}
