//! User entity - the parts of a user account the real-time layer needs

use chrono::{DateTime, Utc};

use crate::value_objects::{Snowflake, UserStatus};

/// Display information attached to messages and events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Snowflake,
    pub username: String,
    pub avatar: Option<String>,
}

impl UserSummary {
    pub fn new(id: Snowflake, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            avatar: None,
        }
    }

    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Presence fields mirrored in the user store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    pub user_id: Snowflake,
    pub status: UserStatus,
    pub last_seen: DateTime<Utc>,
}

impl Presence {
    pub fn online(user_id: Snowflake) -> Self {
        Self {
            user_id,
            status: UserStatus::Online,
            last_seen: Utc::now(),
        }
    }

    pub fn offline(user_id: Snowflake) -> Self {
        Self {
            user_id,
            status: UserStatus::Offline,
            last_seen: Utc::now(),
        }
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        self.status == UserStatus::Online
    }
}
