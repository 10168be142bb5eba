use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::room::types::MemberInfo;

/// Message types for WebSocket communication
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    // Client -> Server
    Join,
    Leave,

    // Client -> Server, relayed verbatim to the room
    Chat,
    StartGame,
    NewQuestion,
    SubmitAnswer,
    PickCategory,

    // Server -> Client
    Joined,
    PlayerJoined,
    PlayerLeft,
    Left,
    Error,
    RoomFull,
    RoomExpired,
}

impl MessageType {
    /// True for gameplay/chat types whose only server-side logic is
    /// tagging the sender and passing the payload through
    pub fn is_relay(&self) -> bool {
        matches!(
            self,
            MessageType::Chat
                | MessageType::StartGame
                | MessageType::NewQuestion
                | MessageType::SubmitAnswer
                | MessageType::PickCategory
        )
    }
}

/// Metadata for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessageMeta {
    pub timestamp: DateTime<Utc>,
}

/// Base structure for WebSocket messages.
///
/// The payload stays an opaque `serde_json::Value` so gameplay fields
/// relay through the server without the engine knowing their shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub meta: Option<WebSocketMessageMeta>,
}

/// Client-to-Server payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPayload {
    pub code: String,
    pub name: Option<String>,
}

/// Server-to-Client payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedPayload {
    pub player_id: u64,
    pub code: String,
    pub players: Vec<MemberInfo>,
    pub target_points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoinedPayload {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeftPayload {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomExpiredPayload {
    pub code: String,
}

/// Helper functions for creating messages
impl WebSocketMessage {
    pub fn new(message_type: MessageType, payload: serde_json::Value) -> Self {
        Self {
            message_type,
            payload,
            meta: Some(WebSocketMessageMeta {
                timestamp: Utc::now(),
            }),
        }
    }

    /// Create a JOINED message (the new member's own roster snapshot)
    pub fn joined(player_id: u64, code: String, players: Vec<MemberInfo>, target_points: u32) -> Self {
        let payload = JoinedPayload {
            player_id,
            code,
            players,
            target_points,
        };
        Self::new(MessageType::Joined, serde_json::to_value(payload).unwrap())
    }

    /// Create a PLAYER_JOINED message
    pub fn player_joined(id: u64, name: String) -> Self {
        let payload = PlayerJoinedPayload { id, name };
        Self::new(
            MessageType::PlayerJoined,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a PLAYER_LEFT message
    pub fn player_left(id: u64, name: String) -> Self {
        let payload = PlayerLeftPayload { id, name };
        Self::new(
            MessageType::PlayerLeft,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a LEFT message (acknowledges the leaver's own departure)
    pub fn left() -> Self {
        Self::new(MessageType::Left, serde_json::Value::Null)
    }

    /// Create an ERROR message
    pub fn error(reason: &str) -> Self {
        let payload = ErrorPayload {
            reason: reason.to_string(),
        };
        Self::new(MessageType::Error, serde_json::to_value(payload).unwrap())
    }

    /// Create a ROOM_FULL message
    pub fn room_full() -> Self {
        Self::new(MessageType::RoomFull, serde_json::Value::Null)
    }

    /// Create a ROOM_EXPIRED message
    pub fn room_expired(code: String) -> Self {
        let payload = RoomExpiredPayload { code };
        Self::new(
            MessageType::RoomExpired,
            serde_json::to_value(payload).unwrap(),
        )
    }
}
