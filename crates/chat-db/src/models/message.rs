//! Message database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for messages table
#[derive(Debug, Clone, FromRow)]
pub struct MessageModel {
    pub id: i64,
    pub sender_id: i64,
    pub room: Option<String>,
    pub recipient_id: Option<i64>,
    pub is_private: bool,
    pub content: String,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Database model for message_reads table
#[derive(Debug, Clone, FromRow)]
pub struct ReadReceiptModel {
    pub message_id: i64,
    pub user_id: i64,
    pub read_at: DateTime<Utc>,
}
