//! Entity to model mappers
//!
//! - `From<Model> for Entity`: Convert database rows to domain objects
//! - `*Insert` structs: Prepare entity data for database operations

mod message;
mod reaction;
mod user;

pub use message::{message_with_parts, MessageInsert};
pub use reaction::ReactionColumns;
