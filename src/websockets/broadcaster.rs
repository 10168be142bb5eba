use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::connection_manager::{ConnectionManager, OutboundFrame};
use super::messages::{MessageType, WebSocketMessage};
use crate::room::models::{Member, RoomModel};

/// Delivers event records to some or all members of a room.
///
/// Serializes each message once and fans it out over the members'
/// connection handles. A member whose connection is no longer writable is
/// skipped; one unreachable member never blocks delivery to the rest.
pub struct RelayBroadcaster {
    connections: Arc<dyn ConnectionManager>,
}

impl RelayBroadcaster {
    pub fn new(connections: Arc<dyn ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Sends `message` to every member of the room, skipping `exclude`
    pub async fn broadcast(
        &self,
        room: &RoomModel,
        message: &WebSocketMessage,
        exclude: Option<u64>,
    ) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(room_code = %room.code, error = %e, "Failed to serialize broadcast");
                return;
            }
        };

        for member in &room.members {
            if Some(member.id) == exclude {
                continue;
            }
            self.connections
                .send_to_member(member.id, OutboundFrame::Text(text.clone()))
                .await;
        }

        debug!(
            room_code = %room.code,
            message_type = ?message.message_type,
            recipients = room.member_count(),
            "Broadcast dispatched"
        );
    }

    /// Tags the payload with sender identity, then broadcasts to the
    /// whole room without exclusion. Used for pass-through event types.
    pub async fn relay(
        &self,
        room: &RoomModel,
        message_type: MessageType,
        payload: Value,
        from: &Member,
    ) {
        let message = WebSocketMessage::new(message_type, tag_sender(payload, from));
        self.broadcast(room, &message, None).await;
    }
}

/// Merges sender identity into an opaque payload. Non-object payloads are
/// wrapped so the identity fields always have somewhere to live.
fn tag_sender(payload: Value, from: &Member) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert("player_id".to_string(), json!(from.id));
    map.insert("player_name".to_string(), json!(from.name));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::models::{RoomModel, RoomParams};
    use crate::websockets::connection_manager::{
        next_connection_id, InMemoryConnectionManager,
    };
    use tokio::sync::mpsc;

    async fn room_with_members(
        manager: &Arc<InMemoryConnectionManager>,
        names: &[&str],
    ) -> (RoomModel, Vec<mpsc::UnboundedReceiver<OutboundFrame>>) {
        let mut room = RoomModel::with_code(
            "042918".to_string(),
            &RoomParams {
                host_name: "host".to_string(),
                ..Default::default()
            },
        );

        let mut receivers = Vec::new();
        for name in names {
            let member = Member::new(Some(name.to_string()));
            let (tx, rx) = mpsc::unbounded_channel();
            let conn_id = next_connection_id();
            manager.add_connection(conn_id, tx).await;
            manager
                .bind_member(conn_id, room.code.clone(), member.id)
                .await;
            room.members.push(member);
            receivers.push(rx);
        }

        (room, receivers)
    }

    fn recv_text(rx: &mut mpsc::UnboundedReceiver<OutboundFrame>) -> Option<String> {
        match rx.try_recv() {
            Ok(OutboundFrame::Text(text)) => Some(text),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_members() {
        let manager = Arc::new(InMemoryConnectionManager::new());
        let (room, mut receivers) = room_with_members(&manager, &["a", "b", "c"]).await;
        let broadcaster = RelayBroadcaster::new(manager);

        broadcaster
            .broadcast(&room, &WebSocketMessage::room_full(), None)
            .await;

        for rx in &mut receivers {
            let text = recv_text(rx).expect("every member should receive the broadcast");
            let value: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["type"], "ROOM_FULL");
        }
    }

    #[tokio::test]
    async fn test_broadcast_skips_excluded_member() {
        let manager = Arc::new(InMemoryConnectionManager::new());
        let (room, mut receivers) = room_with_members(&manager, &["a", "b"]).await;
        let broadcaster = RelayBroadcaster::new(manager);

        let excluded = room.members[0].id;
        broadcaster
            .broadcast(
                &room,
                &WebSocketMessage::player_joined(99, "new".to_string()),
                Some(excluded),
            )
            .await;

        assert!(recv_text(&mut receivers[0]).is_none());
        assert!(recv_text(&mut receivers[1]).is_some());
    }

    #[tokio::test]
    async fn test_broadcast_tolerates_unwritable_member() {
        let manager = Arc::new(InMemoryConnectionManager::new());
        let (room, mut receivers) = room_with_members(&manager, &["a", "b", "c"]).await;
        let broadcaster = RelayBroadcaster::new(manager);

        // Middle member's receiver is gone; its sends fail silently.
        receivers.remove(1);

        broadcaster
            .broadcast(&room, &WebSocketMessage::left(), None)
            .await;

        assert!(recv_text(&mut receivers[0]).is_some());
        assert!(recv_text(&mut receivers[1]).is_some());
    }

    #[tokio::test]
    async fn test_relay_tags_sender_identity() {
        let manager = Arc::new(InMemoryConnectionManager::new());
        let (room, mut receivers) = room_with_members(&manager, &["alice", "bob"]).await;
        let broadcaster = RelayBroadcaster::new(manager);

        let sender = room.members[0].clone();
        broadcaster
            .relay(
                &room,
                MessageType::Chat,
                json!({"content": "hello"}),
                &sender,
            )
            .await;

        // Relay goes to the whole room, sender included
        for rx in &mut receivers {
            let text = recv_text(rx).expect("relay should reach every member");
            let value: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["type"], "CHAT");
            assert_eq!(value["payload"]["content"], "hello");
            assert_eq!(value["payload"]["player_id"], sender.id);
            assert_eq!(value["payload"]["player_name"], "alice");
        }
    }

    #[test]
    fn test_tag_sender_wraps_non_object_payload() {
        let member = Member::new(Some("alice".to_string()));
        let tagged = tag_sender(json!("just a string"), &member);

        assert_eq!(tagged["data"], "just a string");
        assert_eq!(tagged["player_name"], "alice");
    }
}
