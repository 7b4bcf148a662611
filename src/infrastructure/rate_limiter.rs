//! Sliding-window rate limiter keyed by client
//!
//! Stores hit timestamps per key and evicts entries older than the window on
//! each hit. One mutex guards every bucket, so two concurrent callers can never
//! both take the last slot. Idle keys are swept at most once per window, and
//! only while the map is above `PURGE_THRESHOLD`.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Bucket count above which expired buckets are swept
const PURGE_THRESHOLD: usize = 4096;

/// In-memory sliding-window limiter for a single process
#[derive(Debug)]
pub struct RateLimiter {
    /// Hits allowed per window
    capacity: usize,
    /// Window duration
    window: Duration,
    buckets: Mutex<Buckets>,
}

#[derive(Debug, Default)]
struct Buckets {
    /// Hit timestamps per key, oldest first
    hits: HashMap<String, VecDeque<Instant>>,
    /// When idle keys were last swept
    last_purge: Option<Instant>,
}

impl Buckets {
    /// Drop keys with no hit inside the window, once per window at most
    fn purge(&mut self, now: Instant, window: Duration) {
        if self.hits.len() <= PURGE_THRESHOLD {
            return;
        }
        if self
            .last_purge
            .is_some_and(|last| now.saturating_duration_since(last) < window)
        {
            return;
        }
        if let Some(cutoff) = now.checked_sub(window) {
            self.hits
                .retain(|_, hits| hits.back().is_some_and(|last| *last >= cutoff));
        }
        self.last_purge = Some(now);
    }
}

impl RateLimiter {
    /// `capacity` is raised to at least 1, `window` to at least one second
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window: window.max(Duration::from_secs(1)),
            buckets: Mutex::new(Buckets::default()),
        }
    }

    /// Record a hit for `key` now; false when the key is over its limit
    #[inline]
    pub fn hit(&self, key: &str) -> bool {
        self.hit_at(key, Instant::now())
    }

    /// Same as `hit` with an explicit clock reading
    ///
    /// Rejected hits are not recorded.
    pub fn hit_at(&self, key: &str, now: Instant) -> bool {
        let cutoff = now.checked_sub(self.window);
        let mut buckets = self.buckets.lock();
        buckets.purge(now, self.window);

        let hits = buckets.hits.entry(key.to_string()).or_default();
        if let Some(cutoff) = cutoff {
            while hits.front().is_some_and(|first| *first < cutoff) {
                hits.pop_front();
            }
        }

        if hits.len() >= self.capacity {
            return false;
        }
        hits.push_back(now);
        true
    }

    /// Number of keys with a bucket
    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().hits.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }
}
