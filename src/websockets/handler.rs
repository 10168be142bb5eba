use async_trait::async_trait;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::room::repository::{JoinRoomResult, LeaveRoomResult};
use crate::shared::{AppError, AppState};
use crate::websockets::broadcaster::RelayBroadcaster;
use crate::websockets::messages::{JoinPayload, MessageType, WebSocketMessage};

use super::connection_manager::{next_connection_id, ConnectionId, OutboundFrame};
use super::socket::{Connection, MessageHandler};

/// Message handler for receiving WebSocket messages from clients.
///
/// Dispatches JOIN/LEAVE to the room repository and passes gameplay
/// event types straight through to the sender's room.
pub struct WebsocketReceiveHandler {
    state: AppState,
    broadcaster: RelayBroadcaster,
}

impl WebsocketReceiveHandler {
    pub fn new(state: AppState) -> Self {
        let broadcaster = RelayBroadcaster::new(Arc::clone(&state.connection_manager));
        Self { state, broadcaster }
    }

    /// Reports a failure to the offending connection only. Room-full has a
    /// dedicated message type; everything else becomes a targeted ERROR
    /// carrying the error's reason token.
    async fn report_error(&self, connection_id: ConnectionId, error: &AppError) {
        let message = match error {
            AppError::RoomFull => WebSocketMessage::room_full(),
            other => WebSocketMessage::error(&other.ws_reason()),
        };
        self.send_message(connection_id, &message).await;
    }

    async fn send_message(&self, connection_id: ConnectionId, message: &WebSocketMessage) {
        if let Ok(text) = serde_json::to_string(message) {
            self.state
                .connection_manager
                .send_frame(connection_id, OutboundFrame::Text(text))
                .await;
        }
    }

    async fn handle_join(
        &self,
        connection_id: ConnectionId,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        if self
            .state
            .connection_manager
            .binding(connection_id)
            .await
            .is_some()
        {
            return Err(AppError::MalformedInput("already_in_room".to_string()));
        }

        let join: JoinPayload = serde_json::from_value(payload).map_err(|e| {
            warn!(connection_id, error = %e, "Malformed JOIN payload");
            AppError::MalformedInput("malformed_payload".to_string())
        })?;

        let result = self
            .state
            .room_repository
            .try_join_room(&join.code, join.name)
            .await
            .map_err(|e| {
                warn!(connection_id, error = %e, "Join failed");
                AppError::Internal
            })?;

        match result {
            JoinRoomResult::Success { room, member } => {
                self.state
                    .connection_manager
                    .bind_member(connection_id, room.code.clone(), member.id)
                    .await;

                info!(
                    room_code = %room.code,
                    player_id = member.id,
                    player_name = %member.name,
                    "Player joined room"
                );

                let roster = room.members.iter().map(Into::into).collect();
                let joined = WebSocketMessage::joined(
                    member.id,
                    room.code.clone(),
                    roster,
                    room.target_points,
                );
                self.send_message(connection_id, &joined).await;

                let announcement = WebSocketMessage::player_joined(member.id, member.name.clone());
                self.broadcaster
                    .broadcast(&room, &announcement, Some(member.id))
                    .await;
                Ok(())
            }
            JoinRoomResult::RoomFull => {
                debug!(connection_id, code = %join.code, "Join rejected, room full");
                Err(AppError::RoomFull)
            }
            JoinRoomResult::RoomNotFound => {
                debug!(connection_id, code = %join.code, "Join rejected, no such room");
                Err(AppError::NotFound(format!("Room {} not found", join.code)))
            }
        }
    }

    async fn handle_leave(&self, connection_id: ConnectionId) -> Result<(), AppError> {
        let binding = self
            .state
            .connection_manager
            .binding(connection_id)
            .await
            .ok_or(AppError::NotInRoom)?;

        // The binding survives a failed repository call so the leave can
        // be retried; it is cleared only once the registry has answered.
        let result = self
            .state
            .room_repository
            .leave_room(&binding.room_code, binding.member_id)
            .await
            .map_err(|e| {
                warn!(connection_id, error = %e, "Leave failed");
                AppError::Internal
            })?;

        self.state
            .connection_manager
            .clear_binding(connection_id)
            .await;

        match result {
            LeaveRoomResult::Success { room, member } => {
                info!(
                    room_code = %room.code,
                    player_id = member.id,
                    player_name = %member.name,
                    "Player left room"
                );

                self.send_message(connection_id, &WebSocketMessage::left())
                    .await;

                let announcement = WebSocketMessage::player_left(member.id, member.name);
                self.broadcaster.broadcast(&room, &announcement, None).await;
                Ok(())
            }
            LeaveRoomResult::RoomDeleted { member } => {
                info!(
                    room_code = %binding.room_code,
                    player_id = member.id,
                    "Last player left, room deleted"
                );
                self.send_message(connection_id, &WebSocketMessage::left())
                    .await;
                Ok(())
            }
            LeaveRoomResult::MemberNotInRoom | LeaveRoomResult::RoomNotFound => {
                // Binding was stale (room expired underneath us)
                Err(AppError::NotInRoom)
            }
        }
    }

    async fn handle_relay(
        &self,
        connection_id: ConnectionId,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        let binding = self
            .state
            .connection_manager
            .binding(connection_id)
            .await
            .ok_or(AppError::NotInRoom)?;

        let room = self
            .state
            .room_repository
            .get_room(&binding.room_code)
            .await
            .map_err(|e| {
                warn!(connection_id, error = %e, "Room lookup failed");
                AppError::Internal
            })?
            .ok_or(AppError::NotInRoom)?;

        let sender = room
            .get_member(binding.member_id)
            .cloned()
            .ok_or(AppError::NotInRoom)?;

        debug!(
            room_code = %room.code,
            player_id = sender.id,
            message_type = ?message_type,
            "Relaying event to room"
        );

        self.broadcaster
            .relay(&room, message_type, payload, &sender)
            .await;
        Ok(())
    }

    /// Decodes an inbound message and routes it to the matching operation.
    ///
    /// Parsing runs in two steps so invalid JSON and an unrecognized type
    /// tag produce distinct error reasons. Server-to-client tags are not
    /// part of the inbound vocabulary, so they fail the same way as a tag
    /// this server has never heard of.
    async fn dispatch(&self, connection_id: ConnectionId, message: &str) -> Result<(), AppError> {
        let value: serde_json::Value = serde_json::from_str(message).map_err(|e| {
            warn!(connection_id, error = %e, "Failed to parse WebSocket message");
            AppError::MalformedInput("malformed_payload".to_string())
        })?;

        let ws_message: WebSocketMessage = serde_json::from_value(value).map_err(|e| {
            debug!(connection_id, error = %e, "Unknown message type");
            AppError::MalformedInput("unknown_message_type".to_string())
        })?;

        match ws_message.message_type {
            MessageType::Join => self.handle_join(connection_id, ws_message.payload).await,
            MessageType::Leave => self.handle_leave(connection_id).await,
            relay_type if relay_type.is_relay() => {
                self.handle_relay(connection_id, relay_type, ws_message.payload)
                    .await
            }
            other => {
                debug!(connection_id, message_type = ?other, "Message type not accepted inbound");
                Err(AppError::MalformedInput("unknown_message_type".to_string()))
            }
        }
    }
}

#[async_trait]
impl MessageHandler for WebsocketReceiveHandler {
    async fn handle_message(&self, connection_id: ConnectionId, message: String) {
        let outcome = self.dispatch(connection_id, &message).await;
        if let Err(error) = outcome {
            self.report_error(connection_id, &error).await;
        }
    }
}

/// WebSocket endpoint. Connections attach here first and bind to a room
/// afterwards with a JOIN message.
///
/// GET /ws
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, app_state))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(socket: axum::extract::ws::WebSocket, app_state: AppState) {
    let connection_id = next_connection_id();

    info!(connection_id, "WebSocket connection established");

    // Create the outbound channel (app -> client)
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<OutboundFrame>();

    app_state
        .connection_manager
        .add_connection(connection_id, outbound_sender)
        .await;

    let message_handler = Arc::new(WebsocketReceiveHandler::new(app_state.clone()));

    let connection = Connection::new(
        connection_id,
        Box::new(socket),
        outbound_receiver,
        message_handler,
        Arc::clone(&app_state.connection_manager),
    );

    // Run the connection until disconnect
    match connection.run().await {
        Ok(()) => {
            info!(connection_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(connection_id, error = ?e, "WebSocket connection error");
        }
    }

    disconnect_connection(&app_state, connection_id).await;
}

/// Tears down a connection: releases its room membership (announcing the
/// departure) and removes it from the connection registry. Safe to call
/// for a connection that never joined a room.
pub async fn disconnect_connection(state: &AppState, connection_id: ConnectionId) {
    if let Some(binding) = state.connection_manager.binding(connection_id).await {
        match state
            .room_repository
            .leave_room(&binding.room_code, binding.member_id)
            .await
        {
            Ok(LeaveRoomResult::Success { room, member }) => {
                info!(
                    room_code = %room.code,
                    player_id = member.id,
                    "Disconnected player removed from room"
                );
                let broadcaster = RelayBroadcaster::new(Arc::clone(&state.connection_manager));
                let announcement = WebSocketMessage::player_left(member.id, member.name);
                broadcaster.broadcast(&room, &announcement, None).await;
            }
            Ok(LeaveRoomResult::RoomDeleted { member }) => {
                info!(
                    room_code = %binding.room_code,
                    player_id = member.id,
                    "Disconnected player was the last member, room deleted"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(connection_id, error = %e, "Failed to release membership on disconnect");
            }
        }
    }

    state.connection_manager.remove_connection(connection_id).await;

    info!(connection_id, "WebSocket connection removed");
}
