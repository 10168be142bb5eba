use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    service::RoomService,
    types::{RoomCreateRequest, RoomResponse},
};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /room
/// Returns room information with the generated code
#[instrument(name = "create_room", skip(state))]
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<RoomCreateRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    info!(host_name = %request.host_name, "Creating new room");

    let service = RoomService::new(Arc::clone(&state.room_repository));
    let room = service.create_room(request).await?;

    info!(
        room_code = %room.code,
        host_name = %room.host_name,
        "Room created successfully"
    );

    Ok(Json(room))
}

/// HTTP handler for fetching a room by code
///
/// GET /room/{code}
/// Returns room information with the current roster, 404 if unknown
#[instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    let service = RoomService::new(Arc::clone(&state.room_repository));
    let room = service.get_room_details(&code).await?;

    Ok(Json(room))
}

/// HTTP handler for listing all rooms
///
/// GET /rooms
/// Returns array of all active rooms
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoomResponse>>, AppError> {
    let service = RoomService::new(Arc::clone(&state.room_repository));
    let rooms = service.list_rooms().await?;

    info!(room_count = rooms.len(), "Rooms listed successfully");

    Ok(Json(rooms))
}
