//! User database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for users table
#[derive(Debug, Clone, FromRow)]
pub struct UserModel {
    pub id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub status: String,
    pub last_seen: DateTime<Utc>,
}

impl UserModel {
    #[inline]
    pub fn is_online(&self) -> bool {
        self.status == "online"
    }
}
