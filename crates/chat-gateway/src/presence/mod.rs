//! User presence

mod broadcaster;

pub use broadcaster::PresenceBroadcaster;
