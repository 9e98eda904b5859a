//! Database models - SQLx-compatible structs for PostgreSQL tables

mod message;
mod reaction;
mod user;

pub use message::{MessageModel, ReadReceiptModel};
pub use reaction::ReactionModel;
pub use user::UserModel;
