//! add-reaction

use super::{HandlerError, HandlerResult};
use crate::broadcast::Fanout;
use crate::connection::Connection;
use crate::events::{reaction_list, ReactionUpdatedPayload, ServerEvent};
use crate::protocol::AddReactionPayload;
use crate::server::GatewayState;
use std::sync::Arc;

pub struct ReactionHandler;

impl ReactionHandler {
    /// Toggle the actor's reaction on a message and publish the new set
    ///
    /// Room messages go to the room's current members; private messages go to the
    /// actor and, if online, the other participant.
    ///
    /// Toggles on the same message are serialized; the set is loaded and saved
    /// under that message's lock.
    pub async fn toggle(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: AddReactionPayload,
    ) -> HandlerResult<()> {
        let message_id = payload.message_id;
        let lock = state.reaction_lock(message_id);

        let result = {
            let _guard = lock.lock().await;
            Self::toggle_locked(state, connection, payload).await
        };

        state.release_reaction_lock(message_id, lock);
        result
    }

    async fn toggle_locked(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: AddReactionPayload,
    ) -> HandlerResult<()> {
        let kind = payload
            .kind()
            .map_err(|e| HandlerError::Validation(e.to_string()))?;
        let user_id = connection.user_id();

        let mut message = state
            .messages()
            .find_by_id(payload.message_id)
            .await
            .map_err(|e| HandlerError::persistence("add reaction", e))?
            .ok_or(HandlerError::NotFound)?;

        let added = message.reactions.toggle(user_id, kind);

        state
            .messages()
            .save_reactions(message.id, &message.reactions)
            .await
            .map_err(|e| HandlerError::persistence("add reaction", e))?;

        let event = ServerEvent::ReactionUpdated(ReactionUpdatedPayload {
            message_id: message.id,
            reactions: reaction_list(&message.reactions),
        });

        let audience = match message.room() {
            Some(room) => state.rooms().members_of(room),
            None => {
                let mut audience = vec![connection.clone()];
                if let Some(other) = message
                    .counterpart_of(user_id)
                    .and_then(|id| state.registry().lookup(id))
                {
                    audience.push(other);
                }
                audience
            }
        };
        let delivered = Fanout::emit(&audience, &event, None);

        tracing::debug!(
            message_id = %message.id,
            user_id = %user_id,
            reaction = %kind,
            added,
            delivered,
            "Reaction toggled"
        );

        Ok(())
    }
}
