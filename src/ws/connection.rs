//! Upstream WebSocket connection
//!
//! Thin wrapper over tokio-tungstenite used by the feed listener:
//! - Bounded handshake (connect) time
//! - Frame/message size limit
//! - TCP_NODELAY
//! - No logging in send/recv

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::protocol::{Message, WebSocketConfig},
    MaybeTlsStream, WebSocketStream,
};

/// Connection tuning shared by every (re)connect attempt
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound on TCP connect + TLS + WebSocket handshake
    pub handshake_timeout: Duration,
    /// How often to ping upstream while connected
    pub ping_interval: Duration,
    /// Grace period after a missed ping before the link counts as dead
    pub ping_timeout: Duration,
    /// Largest accepted frame/message in bytes
    pub max_frame_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(20),
            ping_interval: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(20),
            max_frame_size: 1 << 20, // 1 MiB
        }
    }
}

/// WebSocket connection to the upstream feed
pub struct WebSocketConnection {
    /// Underlying WebSocket stream
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Connection state
    state: ConnectionState,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    /// Connected and ready
    Connected,
    /// Closed by either side
    Disconnected,
}

/// Errors that can occur with WebSocket connections
#[derive(Debug, thiserror::Error)]
pub enum WebSocketError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
    #[error("Timeout")]
    Timeout,
    #[error("Not connected")]
    NotConnected,
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WebSocketError>;

impl WebSocketConnection {
    /// Connect to WebSocket endpoint
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (wss:// or ws://)
    /// * `config` - handshake timeout and size limits
    ///
    /// Nagle is disabled on the underlying socket by tokio-tungstenite.
    pub async fn connect(url: &str, config: &ConnectionConfig) -> Result<Self> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_frame_size = Some(config.max_frame_size);
        ws_config.max_message_size = Some(config.max_frame_size);

        let connect_future = connect_async_with_config(url, Some(ws_config), true);
        let (ws_stream, _) = timeout(config.handshake_timeout, connect_future)
            .await
            .map_err(|_| WebSocketError::Timeout)?
            .map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            stream: ws_stream,
            state: ConnectionState::Connected,
        })
    }

    /// Send a message
    pub async fn send(&mut self, msg: Message) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(WebSocketError::NotConnected);
        }

        self.stream
            .send(msg)
            .await
            .map_err(|e| WebSocketError::SendFailed(e.to_string()))
    }

    /// Send ping message
    #[inline]
    pub async fn send_ping(&mut self) -> Result<()> {
        self.send(Message::Ping(Bytes::new())).await
    }

    /// Receive a message
    ///
    /// Returns `None` when the stream ends. Pongs to server pings are queued by
    /// tungstenite and flushed on the next read or write.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        if self.state != ConnectionState::Connected {
            return Err(WebSocketError::NotConnected);
        }

        match self.stream.next().await {
            Some(Ok(msg)) => {
                if let Message::Close(_) = &msg {
                    self.state = ConnectionState::Disconnected;
                }
                Ok(Some(msg))
            }
            Some(Err(e)) => Err(WebSocketError::ReceiveFailed(e.to_string())),
            None => {
                self.state = ConnectionState::Disconnected;
                Ok(None)
            }
        }
    }

    /// Check if connected
    #[inline(always)]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Close the connection gracefully
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            let _ = self.stream.close(None).await;
            self.state = ConnectionState::Disconnected;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_websocket_error_display() {
        let err = WebSocketError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
        assert_eq!(WebSocketError::Timeout.to_string(), "Timeout");
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(20));
        assert_eq!(config.max_frame_size, 1_048_576);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("ws://{addr}/ws");
        let result = WebSocketConnection::connect(&url, &ConnectionConfig::default()).await;
        assert!(matches!(result, Err(WebSocketError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        // Accepts TCP but never answers the upgrade request
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let config = ConnectionConfig {
            handshake_timeout: Duration::from_millis(100),
            ..ConnectionConfig::default()
        };
        let url = format!("ws://{addr}/ws");
        let result = WebSocketConnection::connect(&url, &config).await;
        assert!(matches!(result, Err(WebSocketError::Timeout)));
    }

    #[tokio::test]
    async fn test_recv_text_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::text("hello")).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let url = format!("ws://{addr}/ws");
        let mut conn = WebSocketConnection::connect(&url, &ConnectionConfig::default())
            .await
            .unwrap();
        assert!(conn.is_connected());

        match conn.recv().await.unwrap() {
            Some(Message::Text(text)) => assert_eq!(text.as_str(), "hello"),
            other => panic!("unexpected message: {other:?}"),
        }
        match conn.recv().await.unwrap() {
            Some(Message::Close(_)) | None => {}
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(!conn.is_connected());
    }
}
