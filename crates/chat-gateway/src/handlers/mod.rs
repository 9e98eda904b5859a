//! Client event handlers
//!
//! Handles incoming WebSocket events based on their name.

mod error;
mod heartbeat;
mod message;
mod reaction;
mod read_receipt;
mod room;
mod typing;

pub use error::{HandlerError, HandlerResult};
pub use heartbeat::HeartbeatHandler;
pub use message::MessageHandler;
pub use reaction::ReactionHandler;
pub use read_receipt::ReadReceiptHandler;
pub use room::RoomHandler;
pub use typing::TypingHandler;

use crate::connection::Connection;
use crate::events::ServerEvent;
use crate::protocol::{validation_message, ClientEvent, CloseCode};
use crate::server::GatewayState;
use std::sync::Arc;
use validator::Validate;

/// Dispatch incoming client events to appropriate handlers
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Handle one client event
    ///
    /// Failures the client should hear about are sent back as an `error` event.
    /// Returns a close code if the connection must end.
    pub async fn dispatch(
        state: &GatewayState,
        connection: &Arc<Connection>,
        event: ClientEvent,
    ) -> Option<CloseCode> {
        let name = event.name();

        tracing::trace!(
            connection_id = %connection.id(),
            user_id = %connection.user_id(),
            event = name,
            "Received event"
        );

        let result = match event {
            ClientEvent::JoinRoom(payload) => RoomHandler::join(state, connection, payload),
            ClientEvent::LeaveRoom(payload) => RoomHandler::leave(state, connection, payload),
            ClientEvent::SendMessage(payload) => {
                MessageHandler::send_room(state, connection, payload).await
            }
            ClientEvent::SendPrivateMessage(payload) => {
                MessageHandler::send_private(state, connection, payload).await
            }
            ClientEvent::TypingStart(target) => TypingHandler::start(state, connection, &target),
            ClientEvent::TypingStop(target) => TypingHandler::stop(state, connection, &target),
            ClientEvent::AddReaction(payload) => {
                ReactionHandler::toggle(state, connection, payload).await
            }
            ClientEvent::MessageRead(payload) => {
                ReadReceiptHandler::handle(state, connection, payload).await
            }
            ClientEvent::Heartbeat => HeartbeatHandler::handle(connection),
        };

        let Err(err) = result else {
            return None;
        };

        match &err {
            HandlerError::NotFound => tracing::debug!(
                connection_id = %connection.id(),
                event = name,
                "Target not found, ignoring"
            ),
            HandlerError::Validation(_) => tracing::debug!(
                connection_id = %connection.id(),
                event = name,
                error = %err,
                "Rejected event"
            ),
            HandlerError::Persistence { source, .. } => tracing::error!(
                connection_id = %connection.id(),
                user_id = %connection.user_id(),
                event = name,
                error = %source,
                "Store operation failed"
            ),
            HandlerError::Internal(_) => tracing::error!(
                connection_id = %connection.id(),
                event = name,
                error = %err,
                "Handler error"
            ),
        }

        if let Some(message) = err.client_message() {
            connection.deliver(ServerEvent::error(message));
        }

        err.to_close_code()
    }
}

/// Run field validation, mapping failures to the first readable message
fn validate(payload: &impl Validate) -> HandlerResult<()> {
    payload
        .validate()
        .map_err(|e| HandlerError::Validation(validation_message(&e)))
}
