use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{Member, RoomModel};

/// Request payload for creating a new room
#[derive(Debug, Deserialize)]
pub struct RoomCreateRequest {
    pub host_name: String,
    pub max_players: Option<u32>,
    pub target_points: Option<u32>,
}

/// A roster entry: the id+name pair clients use to render members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub id: u64,
    pub name: String,
}

impl From<&Member> for MemberInfo {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
        }
    }
}

/// Response for room creation and fetch-by-code
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomResponse {
    pub code: String,
    pub id: Uuid,
    pub host_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_players: u32,
    pub target_points: u32,
    pub members: Vec<MemberInfo>,
}

impl From<&RoomModel> for RoomResponse {
    fn from(room: &RoomModel) -> Self {
        Self {
            code: room.code.clone(),
            id: room.id,
            host_name: room.host_name.clone(),
            created_at: room.created_at,
            expires_at: room.expires_at,
            max_players: room.max_players,
            target_points: room.target_points,
            members: room.members.iter().map(MemberInfo::from).collect(),
        }
    }
}
