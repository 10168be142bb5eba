// Public API
pub use broadcaster::RelayBroadcaster;
pub use connection_manager::{ConnectionId, ConnectionManager, InMemoryConnectionManager, OutboundFrame};
pub use handler::{websocket_handler, WebsocketReceiveHandler};
pub use liveness_task::{start_liveness_task, LivenessConfig};
pub use messages::{MessageType, WebSocketMessage};
pub use socket::MessageHandler;

// Internal modules
pub mod broadcaster;
pub mod connection_manager;
pub mod handler;
pub mod liveness_task;
pub mod messages;
mod socket;
