// Library crate for the quiz relay server
// This file exposes the public API for integration tests

pub mod room;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use room::{models::RoomModel, repository::RoomRepository};
pub use shared::{AppError, AppState};
pub use websockets::{
    ConnectionManager, MessageHandler, MessageType, WebSocketMessage, WebsocketReceiveHandler,
};
