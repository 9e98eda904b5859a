//! Read receipt entity

use chrono::{DateTime, Utc};

use crate::value_objects::Snowflake;

/// First time a user read a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReceipt {
    pub user_id: Snowflake,
    pub read_at: DateTime<Utc>,
}

impl ReadReceipt {
    pub fn new(user_id: Snowflake, read_at: DateTime<Utc>) -> Self {
        Self { user_id, read_at }
    }
}
