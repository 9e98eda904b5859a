//! Connection management
//!
//! Live WebSocket connections and the per-user registry.

mod connection;
mod registry;

pub use connection::{Connection, ConnectionState};
pub use registry::ConnectionRegistry;
