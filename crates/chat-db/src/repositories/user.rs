//! PostgreSQL implementation of UserRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use chat_core::entities::{Presence, UserSummary};
use chat_core::traits::{RepoResult, UserRepository};
use chat_core::value_objects::Snowflake;

use crate::models::UserModel;

use super::error::{map_db_error, user_not_found};

/// PostgreSQL implementation of UserRepository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_model(&self, id: Snowflake) -> RepoResult<Option<UserModel>> {
        sqlx::query_as::<_, UserModel>(
            r"
            SELECT id, username, avatar, status, last_seen
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// Stored presence of a user, as last mirrored by the coordinator
    #[instrument(skip(self))]
    pub async fn find_presence(&self, id: Snowflake) -> RepoResult<Option<Presence>> {
        Ok(self.find_model(id).await?.as_ref().map(Presence::from))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<UserSummary>> {
        Ok(self.find_model(id).await?.map(UserSummary::from))
    }

    #[instrument(skip(self))]
    async fn update_presence(&self, presence: &Presence) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET status = $2, last_seen = $3
            WHERE id = $1
            ",
        )
        .bind(presence.user_id.into_inner())
        .bind(presence.status.as_str())
        .bind(presence.last_seen)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(presence.user_id));
        }

        Ok(())
    }
}
