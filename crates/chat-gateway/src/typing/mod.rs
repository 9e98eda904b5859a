//! Typing indicators

mod tracker;

pub use tracker::{TypingExpiry, TypingKey, TypingTracker};
