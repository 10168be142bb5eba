use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::connection_manager::{ConnectionId, ConnectionManager, OutboundFrame};

/// Inbound frames the connection loop acts on
#[derive(Debug, PartialEq)]
pub enum InboundFrame {
    /// A decoded text message from the client
    Text(String),
    /// A reply to a liveness probe
    Pong,
    /// The peer closed the connection (or the stream ended)
    Closed,
}

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Push a frame to the client
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<(), SocketError>;

    /// Receive the next meaningful frame from the client
    async fn receive_frame(&mut self) -> Result<InboundFrame, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for incoming WebSocket messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming message from the client
    async fn handle_message(&self, connection_id: ConnectionId, message: String);
}

#[derive(Debug)]
pub enum SocketError {
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<(), SocketError> {
        let message = match frame {
            OutboundFrame::Text(text) => Message::Text(text),
            OutboundFrame::Ping => Message::Ping(vec![]),
            OutboundFrame::Close => Message::Close(None),
        };
        self.send(message)
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_frame(&mut self) -> Result<InboundFrame, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(InboundFrame::Text(text)),
                Some(Ok(Message::Pong(_))) => return Ok(InboundFrame::Pong),
                Some(Ok(Message::Close(_))) => return Ok(InboundFrame::Closed),
                // Pings are answered by the protocol layer; binary is ignored
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
                None => return Ok(InboundFrame::Closed),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// A managed WebSocket connection.
///
/// Pumps outbound frames from the connection manager's channel to the
/// client and inbound text to the message handler. Pong frames clear the
/// connection's unresponsive mark on the transport's own path, which is
/// what the liveness monitor relies on.
pub struct Connection {
    pub connection_id: ConnectionId,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<OutboundFrame>,
    message_handler: Arc<dyn MessageHandler>,
    connections: Arc<dyn ConnectionManager>,
}

impl Connection {
    pub fn new(
        connection_id: ConnectionId,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<OutboundFrame>,
        message_handler: Arc<dyn MessageHandler>,
        connections: Arc<dyn ConnectionManager>,
    ) -> Self {
        Self {
            connection_id,
            socket,
            outbound_receiver,
            message_handler,
            connections,
        }
    }

    /// Run the connection - handles both sending and receiving until disconnect
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Outbound frames (from our app to the client)
                frame = self.outbound_receiver.recv() => {
                    match frame {
                        Some(OutboundFrame::Close) => {
                            let _ = self.socket.send_frame(OutboundFrame::Close).await;
                            break;
                        }
                        Some(frame) => self.socket.send_frame(frame).await?,
                        None => break, // Channel closed, disconnect
                    }
                }

                // Inbound frames (from the client to our app)
                frame = self.socket.receive_frame() => {
                    match frame {
                        Ok(InboundFrame::Text(message)) => {
                            self.message_handler
                                .handle_message(self.connection_id, message)
                                .await;
                        }
                        Ok(InboundFrame::Pong) => {
                            self.connections.mark_alive(self.connection_id).await;
                        }
                        Ok(InboundFrame::Closed) => break,
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(())
    }
}
