//! PostgreSQL implementation of MessageRepository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{instrument, warn};

use chat_core::entities::{Message, NewMessage, Reaction, ReactionSet};
use chat_core::traits::{MessageRepository, RepoResult};
use chat_core::value_objects::{Snowflake, SnowflakeGenerator};

use crate::mappers::{message_with_parts, MessageInsert, ReactionColumns};
use crate::models::{MessageModel, ReactionModel, ReadReceiptModel};

use super::error::{map_db_error, map_foreign_key_violation, message_not_found};

/// PostgreSQL implementation of MessageRepository
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
    id_generator: Arc<SnowflakeGenerator>,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self { pool, id_generator }
    }

    async fn load_reactions(&self, id: Snowflake) -> RepoResult<ReactionSet> {
        let rows = sqlx::query_as::<_, ReactionModel>(
            r"
            SELECT message_id, user_id, kind, created_at
            FROM message_reactions
            WHERE message_id = $1
            ORDER BY created_at
            ",
        )
        .bind(id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match Reaction::try_from(row) {
                Ok(reaction) => Some(reaction),
                Err(e) => {
                    warn!(message_id = %id, error = %e, "Skipping stored reaction");
                    None
                }
            })
            .collect())
    }

    async fn load_reads(&self, id: Snowflake) -> RepoResult<Vec<ReadReceiptModel>> {
        sqlx::query_as::<_, ReadReceiptModel>(
            r"
            SELECT message_id, user_id, read_at
            FROM message_reads
            WHERE message_id = $1
            ORDER BY read_at
            ",
        )
        .bind(id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[instrument(skip(self, message), fields(sender_id = %message.sender_id))]
    async fn create(&self, message: NewMessage) -> RepoResult<Message> {
        let id = self.id_generator.generate();
        let created_at = Utc::now();
        let insert = MessageInsert::new(id, &message);

        sqlx::query(
            r"
            INSERT INTO messages
                (id, sender_id, room, recipient_id, is_private, content, file_url, file_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(insert.id)
        .bind(insert.sender_id)
        .bind(insert.room)
        .bind(insert.recipient_id)
        .bind(insert.is_private)
        .bind(insert.content)
        .bind(insert.file_url)
        .bind(insert.file_type)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(Message::from_new(id, message, created_at))
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        let Some(model) = sqlx::query_as::<_, MessageModel>(
            r"
            SELECT id, sender_id, room, recipient_id, is_private, content, file_url, file_type, created_at
            FROM messages
            WHERE id = $1
            ",
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        else {
            return Ok(None);
        };

        let reactions = self.load_reactions(id).await?;
        let reads = self.load_reads(id).await?;

        Ok(Some(message_with_parts(model, reactions, reads)))
    }

    #[instrument(skip(self, reactions), fields(count = reactions.len()))]
    async fn save_reactions(&self, id: Snowflake, reactions: &ReactionSet) -> RepoResult<()> {
        let columns = ReactionColumns::new(reactions);
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        sqlx::query("DELETE FROM message_reactions WHERE message_id = $1")
            .bind(id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        if !reactions.is_empty() {
            sqlx::query(
                r"
                INSERT INTO message_reactions (message_id, user_id, kind)
                SELECT $1, u, k FROM UNNEST($2::bigint[], $3::text[]) AS t(u, k)
                ",
            )
            .bind(id.into_inner())
            .bind(&columns.user_ids)
            .bind(&columns.kinds)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_foreign_key_violation(e, || message_not_found(id)))?;
        }

        tx.commit().await.map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn append_read_receipt(
        &self,
        id: Snowflake,
        user_id: Snowflake,
        read_at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO message_reads (message_id, user_id, read_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id, user_id) DO NOTHING
            ",
        )
        .bind(id.into_inner())
        .bind(user_id.into_inner())
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_foreign_key_violation(e, || message_not_found(id)))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn count_unread(&self, recipient_id: Snowflake, sender_id: Snowflake) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*)
            FROM messages m
            WHERE m.is_private
              AND m.recipient_id = $1
              AND m.sender_id = $2
              AND NOT EXISTS (
                  SELECT 1 FROM message_reads r
                  WHERE r.message_id = m.id AND r.user_id = $1
              )
            ",
        )
        .bind(recipient_id.into_inner())
        .bind(sender_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }
}
