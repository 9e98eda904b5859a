//! join-room / leave-room

use super::{validate, HandlerError, HandlerResult};
use crate::broadcast::Fanout;
use crate::connection::Connection;
use crate::events::{RoomPresencePayload, ServerEvent};
use crate::protocol::RoomPayload;
use crate::server::GatewayState;
use std::iter;
use std::sync::Arc;

pub struct RoomHandler;

impl RoomHandler {
    /// Join a room and announce it to its members, the joiner included
    pub fn join(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: RoomPayload,
    ) -> HandlerResult<()> {
        let room = room_name(&payload)?;

        if !state.rooms().join(connection, room) {
            return Ok(());
        }

        let event = ServerEvent::UserJoined(RoomPresencePayload::new(connection.user(), room));
        Fanout::emit(&state.rooms().members_of(room), &event, None);

        Ok(())
    }

    /// Leave a room and tell the remaining members and the leaver
    pub fn leave(
        state: &GatewayState,
        connection: &Arc<Connection>,
        payload: RoomPayload,
    ) -> HandlerResult<()> {
        let room = room_name(&payload)?;

        if !state.rooms().leave(connection, room) {
            return Ok(());
        }

        let event = ServerEvent::UserLeft(RoomPresencePayload::new(connection.user(), room));
        let remaining = state.rooms().members_of(room);
        Fanout::emit(remaining.iter().chain(iter::once(connection)), &event, None);

        Ok(())
    }
}

fn room_name(payload: &RoomPayload) -> HandlerResult<&str> {
    validate(payload)?;

    let room = payload.room.trim();
    if room.is_empty() {
        return Err(HandlerError::Validation("Room name is required".to_string()));
    }
    Ok(room)
}
