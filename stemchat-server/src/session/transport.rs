//! Message transport for a session

use axum::extract::ws::{Message, WebSocket};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    Send(String),
}

/// Ordered, bidirectional text channel bound to one client
///
/// `recv` must be cancel-safe: the engine polls it alongside a running job
/// and drops the future when the job finishes first.
#[async_trait::async_trait]
pub trait SessionTransport: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next text message, or `None` once the peer is gone
    async fn recv(&mut self) -> Option<String>;

    async fn close(&mut self);
}

/// Axum WebSocket adapter
pub struct WebSocketTransport {
    socket: WebSocket,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait::async_trait]
impl SessionTransport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<String> {
        while let Some(message) = self.socket.recv().await {
            match message {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Close(_)) => return None,
                // Ping/pong are answered by axum; binary frames carry no commands
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    return None;
                }
            }
        }
        None
    }

    async fn close(&mut self) {
        // Fails harmlessly when the peer already closed
        let _ = self.socket.send(Message::Close(None)).await;
    }
}
