use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

use super::code;
use super::models::{Member, RoomModel, RoomParams};
use crate::shared::AppError;

/// Result of attempting to join a room
#[derive(Debug, Clone)]
pub enum JoinRoomResult {
    /// Successfully joined; returns the updated room and the new member
    Success {
        room: RoomModel,
        member: Member,
    },
    /// Room is at capacity
    RoomFull,
    /// Room does not exist
    RoomNotFound,
}

/// Result of attempting to leave a room
#[derive(Debug, Clone)]
pub enum LeaveRoomResult {
    /// Successfully left; returns the updated room and the removed member
    Success {
        room: RoomModel,
        member: Member,
    },
    /// Member was not in the room
    MemberNotInRoom,
    /// Room does not exist
    RoomNotFound,
    /// Room was deleted because the last member left
    RoomDeleted {
        member: Member,
    },
}

/// Trait for room registry operations.
///
/// The registry is the single source of truth for which rooms and members
/// exist. Every mutation of a room goes through one of these entry points,
/// including the ones triggered by the liveness and expiry tasks.
#[async_trait]
pub trait RoomRepository {
    /// Allocates a fresh code and inserts a new room atomically, so two
    /// concurrent creates can never bind the same code
    async fn create_room(&self, params: &RoomParams) -> Result<RoomModel, AppError>;

    async fn get_room(&self, code: &str) -> Result<Option<RoomModel>, AppError>;

    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError>;

    /// Idempotent removal; no-op if the code is already absent
    async fn delete_room(&self, code: &str) -> Result<(), AppError>;

    /// Returns all rooms whose `expires_at` has passed
    async fn expired_rooms(&self, now: DateTime<Utc>) -> Result<Vec<RoomModel>, AppError>;

    /// Atomically joins a room, checking capacity and appending the member
    /// in one critical section so concurrent joins never exceed capacity
    async fn try_join_room(
        &self,
        code: &str,
        name: Option<String>,
    ) -> Result<JoinRoomResult, AppError>;

    /// Atomically removes a member; deletes the room in the same critical
    /// section when it becomes empty (deliberately no grace period)
    async fn leave_room(&self, code: &str, member_id: u64) -> Result<LeaveRoomResult, AppError>;
}

/// In-memory implementation of RoomRepository.
///
/// A single registry-wide mutex serializes create, join, leave and delete;
/// no await happens while it is held.
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<String, RoomModel>>,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory registry
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, params))]
    async fn create_room(&self, params: &RoomParams) -> Result<RoomModel, AppError> {
        let mut rooms = self.rooms.lock().unwrap();

        // Generate against the locked snapshot; inserting below is what
        // reserves the code.
        let taken = rooms.keys().cloned().collect();
        let room_code = code::generate(&taken)?;

        let room = RoomModel::with_code(room_code, params);
        rooms.insert(room.code.clone(), room.clone());

        info!(
            room_code = %room.code,
            room_id = %room.id,
            host_name = %room.host_name,
            "Room created"
        );
        Ok(room)
    }

    #[instrument(skip(self))]
    async fn get_room(&self, code: &str) -> Result<Option<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        let room = rooms.get(code).cloned();

        match &room {
            Some(r) => debug!(room_code = %code, members = r.member_count(), "Room found"),
            None => debug!(room_code = %code, "Room not found"),
        }

        Ok(room)
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn delete_room(&self, code: &str) -> Result<(), AppError> {
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.remove(code).is_some() {
            info!(room_code = %code, "Room deleted");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn expired_rooms(&self, now: DateTime<Utc>) -> Result<Vec<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms
            .values()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, name))]
    async fn try_join_room(
        &self,
        code: &str,
        name: Option<String>,
    ) -> Result<JoinRoomResult, AppError> {
        let mut rooms = self.rooms.lock().unwrap();

        let room = match rooms.get_mut(code) {
            Some(room) => room,
            None => {
                debug!(room_code = %code, "Join rejected, room not found");
                return Ok(JoinRoomResult::RoomNotFound);
            }
        };

        if room.is_full() {
            debug!(
                room_code = %code,
                member_count = room.member_count(),
                "Join rejected, room is full"
            );
            return Ok(JoinRoomResult::RoomFull);
        }

        let member = Member::new(name);
        room.members.push(member.clone());

        info!(
            room_code = %code,
            member_id = member.id,
            member_name = %member.name,
            member_count = room.member_count(),
            "Member joined room"
        );

        Ok(JoinRoomResult::Success {
            room: room.clone(),
            member,
        })
    }

    #[instrument(skip(self))]
    async fn leave_room(&self, code: &str, member_id: u64) -> Result<LeaveRoomResult, AppError> {
        let mut rooms = self.rooms.lock().unwrap();

        let room = match rooms.get_mut(code) {
            Some(room) => room,
            None => {
                debug!(room_code = %code, "Leave is a no-op, room not found");
                return Ok(LeaveRoomResult::RoomNotFound);
            }
        };

        let position = match room.members.iter().position(|m| m.id == member_id) {
            Some(position) => position,
            None => {
                debug!(room_code = %code, member_id, "Leave is a no-op, member not in room");
                return Ok(LeaveRoomResult::MemberNotInRoom);
            }
        };

        let member = room.members.remove(position);

        if room.members.is_empty() {
            rooms.remove(code);
            info!(room_code = %code, member_id, "Last member left, room deleted");
            return Ok(LeaveRoomResult::RoomDeleted { member });
        }

        info!(
            room_code = %code,
            member_id,
            member_count = room.member_count(),
            "Member left room"
        );

        Ok(LeaveRoomResult::Success {
            room: room.clone(),
            member,
        })
    }
}
