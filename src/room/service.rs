use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    models::{RoomParams, DEFAULT_MAX_PLAYERS, DEFAULT_TARGET_POINTS, DEFAULT_TTL_HOURS},
    repository::RoomRepository,
    types::{RoomCreateRequest, RoomResponse},
};
use crate::shared::AppError;

/// Service for room lifecycle business logic
pub struct RoomService {
    repository: Arc<dyn RoomRepository + Send + Sync>,
}

impl RoomService {
    pub fn new(repository: Arc<dyn RoomRepository + Send + Sync>) -> Self {
        Self { repository }
    }

    /// Creates a new room with a freshly allocated code
    #[instrument(skip(self))]
    pub async fn create_room(&self, request: RoomCreateRequest) -> Result<RoomResponse, AppError> {
        let params = RoomParams {
            host_name: request.host_name,
            max_players: request.max_players.unwrap_or(DEFAULT_MAX_PLAYERS),
            target_points: request.target_points.unwrap_or(DEFAULT_TARGET_POINTS),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        };

        let room = self.repository.create_room(&params).await?;

        info!(
            room_code = %room.code,
            host_name = %room.host_name,
            expires_at = %room.expires_at,
            "Room created successfully"
        );

        Ok(RoomResponse::from(&room))
    }

    /// Gets room details including the current roster, for API endpoints
    #[instrument(skip(self))]
    pub async fn get_room_details(&self, code: &str) -> Result<RoomResponse, AppError> {
        let room = self
            .repository
            .get_room(code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", code)))?;

        Ok(RoomResponse::from(&room))
    }

    /// Lists all active rooms
    #[instrument(skip(self))]
    pub async fn list_rooms(&self) -> Result<Vec<RoomResponse>, AppError> {
        let rooms = self.repository.list_rooms().await?;

        debug!(room_count = rooms.len(), "Rooms retrieved");

        Ok(rooms.iter().map(RoomResponse::from).collect())
    }
}
