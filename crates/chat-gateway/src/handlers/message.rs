//! send-message / send-private-message

use super::{validate, HandlerError, HandlerResult};
use crate::broadcast::Fanout;
use crate::connection::Connection;
use crate::events::{MessagePayload, NotificationPayload, ServerEvent};
use crate::protocol::{SendMessagePayload, SendPrivateMessagePayload};
use crate::server::GatewayState;
use chat_core::{NewMessage, DEFAULT_ROOM};
use std::slice;
use std::sync::Arc;

pub struct MessageHandler;

impl MessageHandler {
    /// Persist a room message, then multicast it to the room's members
    pub async fn send_room(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: SendMessagePayload,
    ) -> HandlerResult<()> {
        validate(&payload)?;
        let new_message = payload.into_new_message(connection.user_id());
        require_body(&new_message)?;

        let message = state
            .messages()
            .create(new_message)
            .await
            .map_err(|e| HandlerError::persistence("send message", e))?;

        let room = message.room().unwrap_or(DEFAULT_ROOM);
        let sender = connection.user();

        // Snapshot taken after the write
        let members = state.rooms().members_of(room);

        let event = ServerEvent::NewMessage(MessagePayload::new(&message, sender, None));
        let delivered = Fanout::emit(&members, &event, None);
        Fanout::notify(
            &members,
            Some(sender.id),
            NotificationPayload::new_message(sender, &message),
        );

        tracing::debug!(
            message_id = %message.id,
            user_id = %sender.id,
            room = %room,
            delivered,
            "Room message sent"
        );

        Ok(())
    }

    /// Persist a private message, echo it to the sender and deliver it to a live recipient
    pub async fn send_private(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: SendPrivateMessagePayload,
    ) -> HandlerResult<()> {
        validate(&payload)?;

        let sender = connection.user();
        let recipient_id = payload.recipient_id;
        if recipient_id == sender.id {
            return Err(HandlerError::Validation(
                "Cannot send a private message to yourself".to_string(),
            ));
        }

        let new_message = payload.into_new_message(sender.id);
        require_body(&new_message)?;

        let recipient = state
            .users()
            .find_by_id(recipient_id)
            .await
            .map_err(|e| HandlerError::persistence("send private message", e))?
            .ok_or_else(|| HandlerError::Validation("Unknown recipient".to_string()))?;

        let message = state
            .messages()
            .create(new_message)
            .await
            .map_err(|e| HandlerError::persistence("send private message", e))?;

        let event =
            ServerEvent::NewPrivateMessage(MessagePayload::new(&message, sender, Some(&recipient)));
        Fanout::emit(slice::from_ref(connection), &event, None);

        let Some(recipient_conn) = state.registry().lookup(recipient.id) else {
            tracing::debug!(
                message_id = %message.id,
                user_id = %sender.id,
                recipient_id = %recipient.id,
                "Recipient offline, stored only"
            );
            return Ok(());
        };

        let audience = slice::from_ref(&recipient_conn);
        Fanout::emit(audience, &event, None);

        let unread = match state.messages().count_unread(recipient.id, sender.id).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(
                    recipient_id = %recipient.id,
                    error = %e,
                    "Failed to count unread messages"
                );
                None
            }
        };
        Fanout::notify(
            audience,
            Some(sender.id),
            NotificationPayload::private_message(sender, &message, unread),
        );

        tracing::debug!(
            message_id = %message.id,
            user_id = %sender.id,
            recipient_id = %recipient.id,
            "Private message delivered"
        );

        Ok(())
    }
}

fn require_body(message: &NewMessage) -> HandlerResult<()> {
    if message.has_body() {
        Ok(())
    } else {
        Err(HandlerError::Validation(
            "Message content or an attachment is required".to_string(),
        ))
    }
}
