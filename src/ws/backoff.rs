//! Jittered exponential backoff for upstream reconnects
//!
//! Each failure waits `min(max, current + U(0, current))`, then doubles
//! `current` (capped at `max`). A successful handshake resets `current` to `min`.

use rand::Rng;
use std::time::Duration;

/// Reconnect delay state for one listener
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// `max` below `min` is raised to `min`
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Calculate next reconnect delay with random jitter
    pub fn next_delay(&mut self) -> Duration {
        let jitter = rand::rng().random::<f64>();
        self.next_delay_with(jitter)
    }

    /// Same as `next_delay` with an explicit jitter fraction in `[0, 1]`
    pub fn next_delay_with(&mut self, jitter: f64) -> Duration {
        let base = self.current;
        let delay = (base + base.mul_f64(jitter.clamp(0.0, 1.0))).min(self.max);
        // Exponential backoff: double the delay, cap at max
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Reset after successful connection
    #[inline]
    pub fn reset(&mut self) {
        self.current = self.min;
    }

    /// Base delay the next failure will start from
    #[inline]
    pub fn current(&self) -> Duration {
        self.current
    }
}
