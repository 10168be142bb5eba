use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::room::repository::RoomRepository;
use crate::websockets::ConnectionManager;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub room_repository: Arc<dyn RoomRepository + Send + Sync>,
    pub connection_manager: Arc<dyn ConnectionManager>,
}

impl AppState {
    pub fn new(
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        connection_manager: Arc<dyn ConnectionManager>,
    ) -> Self {
        Self {
            room_repository,
            connection_manager,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Room is full")]
    RoomFull,

    #[error("Not in a room")]
    NotInRoom,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Room code space exhausted")]
    CodeSpaceExhausted,

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Reason token carried in a targeted WebSocket ERROR event.
    ///
    /// MalformedInput carries the specific token itself, since one variant
    /// covers several distinct client mistakes (bad JSON, unknown type,
    /// invalid payload for the type).
    pub fn ws_reason(&self) -> String {
        match self {
            AppError::NotFound(_) => "room_not_found".to_string(),
            AppError::RoomFull => "room_full".to_string(),
            AppError::NotInRoom => "not_in_room".to_string(),
            AppError::MalformedInput(reason) => reason.clone(),
            AppError::CodeSpaceExhausted => "code_space_exhausted".to_string(),
            AppError::Internal => "internal_error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::RoomFull => (StatusCode::CONFLICT, "Room is full".to_string()),
            AppError::NotInRoom => (StatusCode::FORBIDDEN, "Not in a room".to_string()),
            AppError::MalformedInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::CodeSpaceExhausted => (
                StatusCode::SERVICE_UNAVAILABLE,
                "No room codes available".to_string(),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::room::repository::InMemoryRoomRepository;
    use crate::websockets::InMemoryConnectionManager;

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        room_repository: Option<Arc<dyn RoomRepository + Send + Sync>>,
        connection_manager: Option<Arc<dyn ConnectionManager>>,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                room_repository: None,
                connection_manager: None,
            }
        }

        pub fn with_room_repository(mut self, repo: Arc<dyn RoomRepository + Send + Sync>) -> Self {
            self.room_repository = Some(repo);
            self
        }

        pub fn with_connection_manager(mut self, manager: Arc<dyn ConnectionManager>) -> Self {
            self.connection_manager = Some(manager);
            self
        }

        pub fn build(self) -> AppState {
            AppState {
                room_repository: self
                    .room_repository
                    .unwrap_or_else(|| Arc::new(InMemoryRoomRepository::new())),
                connection_manager: self
                    .connection_manager
                    .unwrap_or_else(|| Arc::new(InMemoryConnectionManager::new())),
            }
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
