use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Default room time-to-live (24 hours)
pub const DEFAULT_TTL_HOURS: i64 = 24;
/// Default room capacity
pub const DEFAULT_MAX_PLAYERS: u32 = 8;
/// Default target points, passed through to clients untouched
pub const DEFAULT_TARGET_POINTS: u32 = 1000;

/// Counter for member ids. Process-wide and monotonic, so an id is
/// never reused, even across rooms.
static NEXT_MEMBER_ID: AtomicU64 = AtomicU64::new(1);

/// A member of a room. The connection handle lives in the connection
/// manager, keyed by connection id; it is not part of the room state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    /// Creates a member with a freshly allocated id. Falls back to a
    /// generated pet name when no display name was supplied.
    pub fn new(name: Option<String>) -> Self {
        let name = name.unwrap_or_else(|| petname::Petnames::default().generate_one(2, "-"));

        Self {
            id: NEXT_MEMBER_ID.fetch_add(1, Ordering::Relaxed),
            name,
            joined_at: Utc::now(),
        }
    }
}

/// Parameters for creating a room; the code is allocated by the repository.
#[derive(Debug, Clone)]
pub struct RoomParams {
    pub host_name: String,
    pub max_players: u32,
    pub target_points: u32,
    pub ttl: Duration,
}

impl Default for RoomParams {
    fn default() -> Self {
        Self {
            host_name: String::new(),
            max_players: DEFAULT_MAX_PLAYERS,
            target_points: DEFAULT_TARGET_POINTS,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }
}

/// In-memory model for an active room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomModel {
    pub code: String,       // 6-digit zero-padded numeric code, primary key
    pub id: Uuid,           // Opaque id, survives code reuse after expiry
    pub host_name: String,  // Display name only, carries no privilege
    pub members: Vec<Member>, // Insertion order = join order
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>, // created_at + TTL, immutable
    pub max_players: u32,
    pub target_points: u32,
    pub is_public: bool, // Reserved, always false
}

impl RoomModel {
    /// Creates a room model under an already-reserved code
    pub fn with_code(code: String, params: &RoomParams) -> Self {
        let created_at = Utc::now();

        Self {
            code,
            id: Uuid::new_v4(),
            host_name: params.host_name.clone(),
            members: vec![],
            created_at,
            expires_at: created_at + params.ttl,
            max_players: params.max_players,
            target_points: params.target_points,
            is_public: false,
        }
    }

    /// Get the current number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if the room is at capacity
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players as usize
    }

    /// Check if a member with this id is in the room
    pub fn has_member(&self, member_id: u64) -> bool {
        self.members.iter().any(|m| m.id == member_id)
    }

    /// Look up a member by id
    pub fn get_member(&self, member_id: u64) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member_id)
    }

    /// Check if the room's TTL has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
