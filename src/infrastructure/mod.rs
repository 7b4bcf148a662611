//! Infrastructure - cold path only
//!
//! This module contains non-latency-critical code:
//! - Configuration management
//! - Logging and metrics
//! - Rate limiting and connection admission
//! - HTTP/WebSocket gateway

pub mod api;
pub mod config;
pub mod connection_limit;
pub mod logging;
pub mod metrics;
pub mod rate_limiter;

pub use api::{start_server, AppState};
pub use connection_limit::{ConnectionLimiter, ConnectionSlot};
pub use rate_limiter::RateLimiter;
