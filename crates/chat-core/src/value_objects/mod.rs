//! Value objects - immutable types that represent domain concepts

mod reaction_kind;
mod snowflake;
mod user_status;

pub use reaction_kind::{ReactionKind, ReactionKindParseError};
pub use snowflake::{Snowflake, SnowflakeGenerator, SnowflakeParseError};
pub use user_status::UserStatus;
