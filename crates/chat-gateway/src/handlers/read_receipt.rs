//! message-read

use super::{HandlerError, HandlerResult};
use crate::broadcast::Fanout;
use crate::connection::Connection;
use crate::events::{ReadReceiptPayload, ServerEvent};
use crate::protocol::MessageReadPayload;
use crate::server::GatewayState;
use chrono::Utc;
use std::slice;
use std::sync::Arc;

pub struct ReadReceiptHandler;

impl ReadReceiptHandler {
    /// Record a read and tell the sender. Failures are logged, never reported.
    pub async fn handle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: MessageReadPayload,
    ) -> HandlerResult<()> {
        if let Err(e) = Self::mark_read(state, connection, payload).await {
            if !matches!(e, HandlerError::NotFound) {
                tracing::warn!(
                    user_id = %connection.user_id(),
                    error = %e,
                    "Failed to record read receipt"
                );
            }
        }
        Ok(())
    }

    async fn mark_read(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: MessageReadPayload,
    ) -> HandlerResult<()> {
        let user_id = connection.user_id();

        let message = state
            .messages()
            .find_by_id(payload.message_id)
            .await
            .map_err(|e| HandlerError::persistence("mark message as read", e))?
            .ok_or(HandlerError::NotFound)?;

        if message.sender_id == user_id || message.has_read(user_id) {
            return Ok(());
        }

        let first_read = state
            .messages()
            .append_read_receipt(message.id, user_id, Utc::now())
            .await
            .map_err(|e| HandlerError::persistence("mark message as read", e))?;

        if !first_read {
            return Ok(());
        }

        tracing::debug!(message_id = %message.id, user_id = %user_id, "Message read");

        if let Some(sender) = state.registry().lookup(message.sender_id) {
            let event = ServerEvent::MessageReadReceipt(ReadReceiptPayload {
                message_id: message.id,
                read_by: user_id,
                username: connection.username().to_string(),
            });
            Fanout::emit(slice::from_ref(&sender), &event, None);
        }

        Ok(())
    }
}
