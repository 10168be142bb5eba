use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};

/// Identifies one live transport connection
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh connection id for a newly accepted socket
pub fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Frames the application pushes into a connection's write loop
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Ping,
    Close,
}

/// Which room membership a connection is bound to, once it has joined
#[derive(Debug, Clone, PartialEq)]
pub struct MemberBinding {
    pub room_code: String,
    pub member_id: u64,
}

/// Tracks every live connection: its outbound sender, its liveness mark,
/// and its room membership binding (if it has joined).
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    async fn add_connection(&self, id: ConnectionId, sender: mpsc::UnboundedSender<OutboundFrame>);

    async fn remove_connection(&self, id: ConnectionId);

    /// Best-effort send; a closed or missing connection is silently skipped
    async fn send_frame(&self, id: ConnectionId, frame: OutboundFrame);

    /// Best-effort send addressed by member id
    async fn send_to_member(&self, member_id: u64, frame: OutboundFrame);

    /// Binds a connection to the room membership it joined as
    async fn bind_member(&self, id: ConnectionId, room_code: String, member_id: u64);

    async fn clear_binding(&self, id: ConnectionId);

    async fn binding(&self, id: ConnectionId) -> Option<MemberBinding>;

    /// Clears the unresponsive mark; called when the transport observes a
    /// probe reply from this connection
    async fn mark_alive(&self, id: ConnectionId);

    async fn mark_unresponsive(&self, id: ConnectionId);

    /// Snapshot of (connection id, alive mark) for the liveness monitor
    async fn liveness_snapshot(&self) -> Vec<(ConnectionId, bool)>;
}

struct ConnectionEntry {
    sender: mpsc::UnboundedSender<OutboundFrame>,
    alive: bool,
    binding: Option<MemberBinding>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    // member id -> connection id, kept in sync with the bindings above
    members: HashMap<u64, ConnectionId>,
}

pub struct InMemoryConnectionManager {
    registry: RwLock<Registry>,
}

impl Default for InMemoryConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnectionManager {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn add_connection(&self, id: ConnectionId, sender: mpsc::UnboundedSender<OutboundFrame>) {
        let mut registry = self.registry.write().await;
        registry.connections.insert(
            id,
            ConnectionEntry {
                sender,
                alive: true,
                binding: None,
            },
        );
    }

    async fn remove_connection(&self, id: ConnectionId) {
        let mut registry = self.registry.write().await;
        if let Some(entry) = registry.connections.remove(&id) {
            if let Some(binding) = entry.binding {
                registry.members.remove(&binding.member_id);
            }
        }
    }

    async fn send_frame(&self, id: ConnectionId, frame: OutboundFrame) {
        let registry = self.registry.read().await;
        if let Some(entry) = registry.connections.get(&id) {
            let _ = entry.sender.send(frame);
        }
    }

    async fn send_to_member(&self, member_id: u64, frame: OutboundFrame) {
        let registry = self.registry.read().await;
        if let Some(id) = registry.members.get(&member_id) {
            if let Some(entry) = registry.connections.get(id) {
                let _ = entry.sender.send(frame);
            }
        }
    }

    async fn bind_member(&self, id: ConnectionId, room_code: String, member_id: u64) {
        let mut registry = self.registry.write().await;
        registry.members.insert(member_id, id);
        if let Some(entry) = registry.connections.get_mut(&id) {
            entry.binding = Some(MemberBinding {
                room_code,
                member_id,
            });
        }
    }

    async fn clear_binding(&self, id: ConnectionId) {
        let mut registry = self.registry.write().await;
        if let Some(entry) = registry.connections.get_mut(&id) {
            if let Some(binding) = entry.binding.take() {
                registry.members.remove(&binding.member_id);
            }
        }
    }

    async fn binding(&self, id: ConnectionId) -> Option<MemberBinding> {
        let registry = self.registry.read().await;
        registry
            .connections
            .get(&id)
            .and_then(|entry| entry.binding.clone())
    }

    async fn mark_alive(&self, id: ConnectionId) {
        let mut registry = self.registry.write().await;
        if let Some(entry) = registry.connections.get_mut(&id) {
            entry.alive = true;
        }
    }

    async fn mark_unresponsive(&self, id: ConnectionId) {
        let mut registry = self.registry.write().await;
        if let Some(entry) = registry.connections.get_mut(&id) {
            entry.alive = false;
        }
    }

    async fn liveness_snapshot(&self) -> Vec<(ConnectionId, bool)> {
        let registry = self.registry.read().await;
        registry
            .connections
            .iter()
            .map(|(id, entry)| (*id, entry.alive))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_send_remove() {
        let manager = InMemoryConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = next_connection_id();

        manager.add_connection(id, tx).await;
        manager
            .send_frame(id, OutboundFrame::Text("hello".to_string()))
            .await;

        assert_eq!(
            rx.recv().await,
            Some(OutboundFrame::Text("hello".to_string()))
        );

        manager.remove_connection(id).await;
        manager
            .send_frame(id, OutboundFrame::Text("gone".to_string()))
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_closed_connection_is_swallowed() {
        let manager = InMemoryConnectionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = next_connection_id();

        manager.add_connection(id, tx).await;
        drop(rx); // Receiver gone, sends start failing

        // Must not panic or propagate an error
        manager
            .send_frame(id, OutboundFrame::Text("dropped".to_string()))
            .await;
    }

    #[tokio::test]
    async fn test_bind_and_lookup_member() {
        let manager = InMemoryConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = next_connection_id();

        manager.add_connection(id, tx).await;
        assert!(manager.binding(id).await.is_none());

        manager.bind_member(id, "042918".to_string(), 7).await;

        let binding = manager.binding(id).await.unwrap();
        assert_eq!(binding.room_code, "042918");
        assert_eq!(binding.member_id, 7);

        manager
            .send_to_member(7, OutboundFrame::Text("hi".to_string()))
            .await;
        assert_eq!(rx.recv().await, Some(OutboundFrame::Text("hi".to_string())));
    }

    #[tokio::test]
    async fn test_clear_binding_removes_member_index() {
        let manager = InMemoryConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = next_connection_id();

        manager.add_connection(id, tx).await;
        manager.bind_member(id, "000001".to_string(), 9).await;
        manager.clear_binding(id).await;

        assert!(manager.binding(id).await.is_none());
        manager
            .send_to_member(9, OutboundFrame::Text("lost".to_string()))
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_connection_clears_member_index() {
        let manager = InMemoryConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = next_connection_id();

        manager.add_connection(id, tx).await;
        manager.bind_member(id, "000001".to_string(), 11).await;
        manager.remove_connection(id).await;

        let snapshot = manager.liveness_snapshot().await;
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_liveness_marks() {
        let manager = InMemoryConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = next_connection_id();

        manager.add_connection(id, tx).await;
        assert_eq!(manager.liveness_snapshot().await, vec![(id, true)]);

        manager.mark_unresponsive(id).await;
        assert_eq!(manager.liveness_snapshot().await, vec![(id, false)]);

        manager.mark_alive(id).await;
        assert_eq!(manager.liveness_snapshot().await, vec![(id, true)]);
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let a = next_connection_id();
        let b = next_connection_id();
        assert_ne!(a, b);
    }
}
