use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

use crate::shared::{AppError, AppState};
use crate::websockets::broadcaster::RelayBroadcaster;
use crate::websockets::connection_manager::OutboundFrame;
use crate::websockets::messages::WebSocketMessage;

/// Configuration for the expiry sweep task
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// How often to sweep for expired rooms
    pub sweep_interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Starts the background task that periodically deletes expired rooms
#[instrument(skip(state))]
pub async fn start_expiry_task(state: AppState, config: ExpiryConfig) {
    info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "Starting room expiry background task"
    );

    let mut sweep_interval = interval(config.sweep_interval);

    loop {
        sweep_interval.tick().await;

        match sweep_expired_rooms(&state, Utc::now()).await {
            Ok(0) => {}
            Ok(deleted_count) => {
                info!(deleted_count, "Expired rooms deleted");
            }
            Err(e) => {
                error!(error = %e, "Room expiry sweep failed");
            }
        }
    }
}

/// One sweep pass: deletes every room whose deadline has passed, notifying
/// and closing any members still connected. Returns the number deleted.
///
/// Kept separate from the interval loop so tests can drive sweeps with a
/// chosen clock.
#[instrument(skip(state))]
pub async fn sweep_expired_rooms(
    state: &AppState,
    now: chrono::DateTime<Utc>,
) -> Result<usize, AppError> {
    let expired = state.room_repository.expired_rooms(now).await?;

    if expired.is_empty() {
        return Ok(0);
    }

    info!(count = expired.len(), "Found expired rooms to delete");

    let broadcaster = RelayBroadcaster::new(Arc::clone(&state.connection_manager));
    let mut deleted_count = 0;

    for room in expired {
        // Notification is best effort; deletion happens regardless
        let notice = WebSocketMessage::room_expired(room.code.clone());
        broadcaster.broadcast(&room, &notice, None).await;

        for member in &room.members {
            state
                .connection_manager
                .send_to_member(member.id, OutboundFrame::Close)
                .await;
        }

        match state.room_repository.delete_room(&room.code).await {
            Ok(()) => {
                deleted_count += 1;
                info!(room_code = %room.code, members = room.member_count(), "Deleted expired room");
            }
            Err(e) => {
                warn!(room_code = %room.code, error = %e, "Failed to delete expired room");
            }
        }
    }

    Ok(deleted_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::models::RoomParams;
    use crate::room::repository::{InMemoryRoomRepository, JoinRoomResult, RoomRepository};
    use crate::shared::test_utils::AppStateBuilder;
    use crate::websockets::connection_manager::next_connection_id;
    use chrono::Duration as ChronoDuration;
    use tokio::sync::mpsc;

    async fn state_with_repo() -> (AppState, Arc<InMemoryRoomRepository>) {
        let repository = Arc::new(InMemoryRoomRepository::new());
        let state = AppStateBuilder::new()
            .with_room_repository(repository.clone())
            .build();
        (state, repository)
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_rooms() {
        let (state, repository) = state_with_repo().await;

        let room = repository
            .create_room(&RoomParams {
                host_name: "host".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        // Not expired at creation time
        let deleted = sweep_expired_rooms(&state, Utc::now()).await.unwrap();
        assert_eq!(deleted, 0);
        assert!(repository.get_room(&room.code).await.unwrap().is_some());

        // Expired once the clock passes the deadline
        let later = Utc::now() + ChronoDuration::hours(25);
        let deleted = sweep_expired_rooms(&state, later).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repository.get_room(&room.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_preserves_fresh_rooms() {
        let (state, repository) = state_with_repo().await;

        let old = repository
            .create_room(&RoomParams {
                host_name: "old".to_string(),
                ttl: ChronoDuration::minutes(5),
                ..Default::default()
            })
            .await
            .unwrap();
        let fresh = repository
            .create_room(&RoomParams {
                host_name: "fresh".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let later = Utc::now() + ChronoDuration::hours(1);
        let deleted = sweep_expired_rooms(&state, later).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(repository.get_room(&old.code).await.unwrap().is_none());
        assert!(repository.get_room(&fresh.code).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_notifies_and_closes_connected_members() {
        let (state, repository) = state_with_repo().await;

        let room = repository
            .create_room(&RoomParams {
                host_name: "host".to_string(),
                ttl: ChronoDuration::minutes(1),
                ..Default::default()
            })
            .await
            .unwrap();
        let member = match repository
            .try_join_room(&room.code, Some("alice".to_string()))
            .await
            .unwrap()
        {
            JoinRoomResult::Success { member, .. } => member,
            other => panic!("unexpected join result: {:?}", other),
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn_id = next_connection_id();
        state.connection_manager.add_connection(conn_id, tx).await;
        state
            .connection_manager
            .bind_member(conn_id, room.code.clone(), member.id)
            .await;

        let later = Utc::now() + ChronoDuration::hours(1);
        let deleted = sweep_expired_rooms(&state, later).await.unwrap();
        assert_eq!(deleted, 1);

        match rx.try_recv() {
            Ok(OutboundFrame::Text(text)) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["type"], "ROOM_EXPIRED");
                assert_eq!(value["payload"]["code"], room.code);
            }
            other => panic!("expected expiry notice, got {:?}", other),
        }
        assert_eq!(rx.try_recv(), Ok(OutboundFrame::Close));
    }

    #[tokio::test]
    async fn test_sweep_with_no_rooms() {
        let (state, _repository) = state_with_repo().await;

        let deleted = sweep_expired_rooms(&state, Utc::now()).await.unwrap();
        assert_eq!(deleted, 0);
    }
}
