//! User entity <-> model mapper

use chat_core::entities::{Presence, UserSummary};
use chat_core::value_objects::{Snowflake, UserStatus};

use crate::models::UserModel;

impl From<UserModel> for UserSummary {
    fn from(model: UserModel) -> Self {
        UserSummary {
            id: Snowflake::new(model.id),
            username: model.username,
            avatar: model.avatar,
        }
    }
}

impl From<&UserModel> for Presence {
    fn from(model: &UserModel) -> Self {
        Presence {
            user_id: Snowflake::new(model.id),
            status: UserStatus::from_stored(&model.status),
            last_seen: model.last_seen,
        }
    }
}
