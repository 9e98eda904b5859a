//! WebSocket handler
//!
//! Authenticates the upgrade request, then runs the socket's receive, send and
//! liveness tasks until one of them ends.

use crate::connection::Connection;
use crate::events::ServerEvent;
use crate::handlers::{MessageDispatcher, TypingHandler};
use crate::protocol::{ClientEvent, CloseCode};
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chat_common::{AppError, ErrorResponse};
use chat_core::UserSummary;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

/// How long the send task gets to flush a close frame
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Query parameters of the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

/// WebSocket gateway handler
///
/// The token comes from `?token=` or an `Authorization: Bearer` header. A
/// rejected token answers with an HTTP error and no upgrade.
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = query.token.or_else(|| bearer_token(&headers));

    match authenticate(&state, token.as_deref()).await {
        Ok(user) => ws
            .on_upgrade(move |socket| handle_socket(state, socket, user))
            .into_response(),
        Err(e) => {
            tracing::info!(error = %e, "Gateway handshake rejected");
            reject(&e)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

async fn authenticate(state: &GatewayState, token: Option<&str>) -> Result<UserSummary, AppError> {
    let token = token
        .filter(|token| !token.is_empty())
        .ok_or(AppError::MissingAuth)?;

    let user_id = state.jwt().authenticate(token)?;

    state
        .users()
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::UnknownUser)
}

fn reject(err: &AppError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
    (status, Json(ErrorResponse::from(err))).into_response()
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket, user: UserSummary) {
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.realtime().outbound_buffer.max(1));
    let connection = Connection::new(user, tx);
    let connection_id = connection.id().to_string();

    tracing::info!(
        connection_id = %connection_id,
        user_id = %connection.user_id(),
        "WebSocket connection established"
    );

    state.presence().connect(&connection).await;
    connection.deliver(ServerEvent::OnlineUsers(state.registry().list_online()));

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Receive: one event at a time, in arrival order
    let state_recv = state.clone();
    let connection_recv = connection.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = ws_stream.next().await {
            connection_recv.record_heartbeat();

            match frame {
                Ok(Message::Text(text)) => {
                    if let Some(code) = handle_text(&state_recv, &connection_recv, &text).await {
                        connection_recv.close(Some(code));
                        break;
                    }
                }
                Ok(Message::Binary(_)) => {
                    tracing::debug!(
                        connection_id = %connection_recv.id(),
                        "Binary frames not supported"
                    );
                    connection_recv.close(Some(CloseCode::DecodeError));
                    break;
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %connection_recv.id(), "Client closed connection");
                    break;
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_recv.id(),
                        error = %e,
                        "WebSocket error"
                    );
                    break;
                }
            }
        }
    });

    // Send: drain the outbound queue, ping, and write the close frame when asked to
    let connection_send = connection.clone();
    let ping_every = state.realtime().heartbeat_interval();
    let mut send_task = tokio::spawn(async move {
        let mut ping = interval(ping_every);
        ping.tick().await;

        loop {
            tokio::select! {
                () = connection_send.closed() => {
                    let frame = match connection_send.close_code() {
                        Some(code) => CloseFrame {
                            code: code.as_u16(),
                            reason: code.description().into(),
                        },
                        None => CloseFrame {
                            code: close_code::NORMAL,
                            reason: "".into(),
                        },
                    };
                    let _ = ws_sink.send(Message::Close(Some(frame))).await;
                    break;
                }
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    match event.to_json() {
                        Ok(json) => {
                            if ws_sink.send(Message::Text(json)).await.is_err() {
                                tracing::debug!(
                                    connection_id = %connection_send.id(),
                                    "Failed to write to WebSocket"
                                );
                                break;
                            }
                        }
                        Err(e) => tracing::error!(
                            event = event.name(),
                            error = %e,
                            "Failed to serialize event"
                        ),
                    }
                }
                _ = ping.tick() => {
                    if ws_sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Liveness: any inbound frame counts as a heartbeat
    let connection_hb = connection.clone();
    let timeout = state.realtime().heartbeat_timeout();
    let mut heartbeat_task = tokio::spawn(async move {
        let mut check = interval(timeout / 4);

        loop {
            check.tick().await;

            let silent_for = connection_hb.time_since_heartbeat();
            if silent_for > timeout {
                tracing::warn!(
                    connection_id = %connection_hb.id(),
                    silent_ms = silent_for.as_millis(),
                    "Connection timed out (no heartbeat)"
                );
                connection_hb.close(Some(CloseCode::SessionTimeout));
                break;
            }
        }
    });

    let send_finished = tokio::select! {
        _ = &mut recv_task => false,
        _ = &mut send_task => true,
        _ = &mut heartbeat_task => false,
    };

    connection.close(None);
    recv_task.abort();
    heartbeat_task.abort();
    if !send_finished && tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }

    cleanup_connection(&state, &connection).await;

    tracing::info!(
        connection_id = %connection_id,
        close_code = ?connection.close_code(),
        "WebSocket connection closed"
    );
}

/// Decode and dispatch a text frame. Returns a close code if the socket must close.
async fn handle_text(
    state: &GatewayState,
    connection: &Arc<Connection>,
    text: &str,
) -> Option<CloseCode> {
    match ClientEvent::from_json(text) {
        Ok(event) => MessageDispatcher::dispatch(state, connection, event).await,
        Err(e) => {
            tracing::debug!(
                connection_id = %connection.id(),
                error = %e,
                "Failed to decode event"
            );
            connection.deliver(ServerEvent::error(format!("Invalid event: {e}")));
            None
        }
    }
}

/// Tear down a connection: rooms first, then presence, then typing
///
/// A superseded connection only leaves its rooms; presence and typing belong
/// to the connection that replaced it. Typing is cleared under the presence
/// transition lock.
async fn cleanup_connection(state: &GatewayState, connection: &Arc<Connection>) {
    let rooms_left = state.rooms().leave_all(connection);

    state
        .presence()
        .disconnect(connection, |user_id| TypingHandler::clear_user(state, user_id))
        .await;

    tracing::debug!(
        connection_id = %connection.id(),
        rooms_left = rooms_left.len(),
        "Connection cleaned up"
    );
}
