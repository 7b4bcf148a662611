//! WebSocket client plumbing for the upstream feed

pub mod backoff;
pub mod connection;
pub mod ping;

pub use backoff::Backoff;
pub use connection::{ConnectionConfig, WebSocketConnection, WebSocketError};
pub use ping::PingHandler;
