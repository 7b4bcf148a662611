//! Metrics collection for system monitoring
//!
//! Lock-free metrics counters using atomic operations.
//! Collected by the feed listener and broker, exported via /healthz.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// System metrics collector
///
/// Thread-safe counters updated from the ingest path.
/// Snapshots taken for API export. Nothing in the pipeline reads them back.
pub struct MetricsCollector {
    /// Text frames received from upstream
    frames_received: AtomicU64,
    /// Frames that were not valid JSON
    decode_errors: AtomicU64,
    /// Frames decoded but missing/invalid ticker fields
    invalid_updates: AtomicU64,
    /// Updates handed to the broker
    updates_published: AtomicU64,
    /// Reconnect attempts after a connection-level failure
    reconnects: AtomicU64,
    /// Messages evicted from a full subscriber queue
    messages_evicted: AtomicU64,
    /// Messages dropped because a queue stayed full after eviction
    messages_dropped: AtomicU64,
    /// Upstream connection status
    feed_connected: AtomicBool,
    /// Last upstream frame timestamp (Unix millis)
    last_message_time: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for API export
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub decode_errors: u64,
    pub invalid_updates: u64,
    pub updates_published: u64,
    pub reconnects: u64,
    pub messages_evicted: u64,
    pub messages_dropped: u64,
    pub feed_connected: bool,
    pub message_rate: f64, // frames per second
    /// Time since the last upstream frame, capped at 10s
    pub last_frame_age_ms: u64,
    pub uptime_seconds: u64,
}

impl MetricsCollector {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            invalid_updates: AtomicU64::new(0),
            updates_published: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            messages_evicted: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            feed_connected: AtomicBool::new(false),
            last_message_time: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a text frame from upstream
    #[inline]
    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.update_last_message_time();
    }

    #[inline]
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_invalid_update(&self) {
        self.invalid_updates.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_published(&self) {
        self.updates_published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evicted(&self) {
        self.messages_evicted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Update last message timestamp
    #[inline]
    fn update_last_message_time(&self) {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last_message_time.store(now, Ordering::Relaxed);
    }

    /// Set upstream connection status
    pub fn set_feed_connected(&self, connected: bool) {
        self.feed_connected.store(connected, Ordering::Relaxed);
    }

    /// Check if the upstream feed is connected
    pub fn is_connected(&self) -> bool {
        self.feed_connected.load(Ordering::Relaxed)
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let frames = self.frames_received.load(Ordering::Relaxed);

        let uptime = self.start_time.elapsed().as_secs();
        let rate = if uptime > 0 {
            frames as f64 / uptime as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            frames_received: frames,
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            invalid_updates: self.invalid_updates.load(Ordering::Relaxed),
            updates_published: self.updates_published.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            messages_evicted: self.messages_evicted.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            feed_connected: self.is_connected(),
            message_rate: rate,
            last_frame_age_ms: self.latency_ms(),
            uptime_seconds: uptime,
        }
    }

    /// Get latency estimate in milliseconds
    /// Returns time since last upstream frame, capped at 10000ms
    pub fn latency_ms(&self) -> u64 {
        let last = self.last_message_time.load(Ordering::Relaxed);
        if last == 0 {
            return 10000; // No messages yet
        }

        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        now.saturating_sub(last).min(10000)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
