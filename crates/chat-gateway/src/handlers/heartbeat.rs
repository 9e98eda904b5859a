//! heartbeat

use super::HandlerResult;
use crate::connection::Connection;
use crate::events::ServerEvent;
use std::sync::Arc;

/// Handles heartbeat events
pub struct HeartbeatHandler;

impl HeartbeatHandler {
    pub fn handle(connection: &Arc<Connection>) -> HandlerResult<()> {
        connection.record_heartbeat();

        tracing::trace!(connection_id = %connection.id(), "Heartbeat received");

        if !connection.deliver(ServerEvent::HeartbeatAck) {
            tracing::warn!(connection_id = %connection.id(), "Failed to queue heartbeat ACK");
        }

        Ok(())
    }
}
