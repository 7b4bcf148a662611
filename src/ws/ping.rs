//! Ping/Pong liveness tracking for the upstream connection
//!
//! The receive loop pings on a fixed interval and records every inbound frame.
//! A link that has been silent for longer than one ping interval plus the pong
//! timeout is treated as dead and torn down for reconnection.

use std::time::Duration;
use tokio::time::Instant;

/// Ping/Pong handler for connection keep-alive
#[derive(Debug)]
pub struct PingHandler {
    /// How often to send pings
    ping_interval: Duration,
    /// How long to wait for any traffic after a ping
    pong_timeout: Duration,
    /// Last time anything arrived from the server
    last_seen: Instant,
}

impl PingHandler {
    pub fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
            last_seen: Instant::now(),
        }
    }

    /// Record inbound traffic (data frame, pong, or server ping)
    #[inline]
    pub fn record_activity(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Silent for longer than one ping interval plus the pong timeout
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    pub fn is_stale_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > self.ping_interval + self.pong_timeout
    }
}
