//! # chat-gateway
//!
//! WebSocket gateway coordinating presence, rooms, typing indicators and
//! message delivery between connected users.

pub mod broadcast;
pub mod connection;
pub mod events;
pub mod handlers;
pub mod presence;
pub mod protocol;
pub mod rooms;
pub mod server;
pub mod typing;

pub use server::{create_app, create_gateway_state, create_router, run, run_server, GatewayState};
