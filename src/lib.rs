//! Binance ticker relay
//!
//! Core library: upstream feed listener, latest-value cache with bounded
//! per-subscriber fan-out, and the HTTP/WebSocket gateway around them.

pub mod core;
pub mod exchanges;
pub mod hot_path;
pub mod infrastructure;
pub mod ws;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use infrastructure::config::{ApiConfig, Config, ConfigError, FeedConfig};

use thiserror::Error;

/// Main error type for the relay
///
/// Only startup paths return it; runtime feed failures are retried.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] ws::WebSocketError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;
