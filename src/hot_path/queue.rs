//! Bounded per-subscriber message queue
//!
//! Lock-free FIFO (crossbeam-queue) with drop-oldest overflow handling.
//! The broker pushes without ever waiting; the subscriber task awaits.

use crate::core::SharedMessage;
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Outcome of a non-blocking offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Enqueued without touching older messages
    Queued,
    /// Queue was full; the oldest message was evicted to make room
    EvictedOldest,
    /// Queue stayed full after eviction (concurrent producer); message dropped
    Dropped,
    /// Subscriber is gone
    Closed,
}

/// Bounded FIFO of serialized messages for one subscriber
///
/// # Type Notes
/// Messages are `Arc<str>` so a broadcast is serialized once and shared.
///
/// # Example
/// ```
/// use ticker_relay::hot_path::{Delivery, SubscriberQueue};
/// use std::sync::Arc;
///
/// let queue = SubscriberQueue::new(1);
/// assert_eq!(queue.offer(Arc::from("a")), Delivery::Queued);
/// assert_eq!(queue.offer(Arc::from("b")), Delivery::EvictedOldest);
/// assert_eq!(queue.try_recv().as_deref(), Some("b"));
/// ```
pub struct SubscriberQueue {
    buffer: ArrayQueue<SharedMessage>,
    notify: Notify,
    closed: AtomicBool,
}

impl SubscriberQueue {
    /// Create a queue holding at most `capacity` messages (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: ArrayQueue::new(capacity.max(1)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue without waiting
    ///
    /// On overflow exactly one oldest message is evicted and the push is
    /// retried once. Chronological order of what remains is preserved.
    ///
    /// # Performance
    /// O(1), lock-free. Never blocks the publisher.
    pub fn offer(&self, msg: SharedMessage) -> Delivery {
        if self.is_closed() {
            return Delivery::Closed;
        }

        let outcome = match self.buffer.push(msg) {
            Ok(()) => Delivery::Queued,
            Err(msg) => {
                let _ = self.buffer.pop();
                match self.buffer.push(msg) {
                    Ok(()) => Delivery::EvictedOldest,
                    Err(_) => Delivery::Dropped,
                }
            }
        };

        if outcome != Delivery::Dropped {
            self.notify.notify_one();
        }
        outcome
    }

    /// Pop the next message if one is buffered
    #[inline]
    pub fn try_recv(&self) -> Option<SharedMessage> {
        self.buffer.pop()
    }

    /// Wait for the next message
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub async fn recv(&self) -> Option<SharedMessage> {
        loop {
            let notified = self.notify.notified();
            if let Some(msg) = self.buffer.pop() {
                return Some(msg);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Wait for the next message until `deadline`
    ///
    /// `Err(Elapsed)` means nothing arrived before the deadline. Callers keep
    /// the deadline across retries so unrelated wakeups do not extend it.
    pub async fn recv_deadline(
        &self,
        deadline: Instant,
    ) -> Result<Option<SharedMessage>, tokio::time::error::Elapsed> {
        tokio::time::timeout_at(deadline, self.recv()).await
    }

    /// Close the queue; buffered messages can still be drained
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of buffered messages
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn msg(s: &str) -> SharedMessage {
        Arc::from(s)
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = SubscriberQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_fifo_order() {
        let queue = SubscriberQueue::new(4);
        queue.offer(msg("1"));
        queue.offer(msg("2"));
        queue.offer(msg("3"));

        assert_eq!(queue.try_recv().as_deref(), Some("1"));
        assert_eq!(queue.try_recv().as_deref(), Some("2"));
        assert_eq!(queue.try_recv().as_deref(), Some("3"));
        assert!(queue.try_recv().is_none());
    }

    #[test]
    fn test_overflow_evicts_oldest_and_keeps_order() {
        let queue = SubscriberQueue::new(3);
        for i in 0..10 {
            let outcome = queue.offer(msg(&i.to_string()));
            if i < 3 {
                assert_eq!(outcome, Delivery::Queued);
            } else {
                assert_eq!(outcome, Delivery::EvictedOldest);
            }
            assert!(queue.len() <= 3);
        }

        let drained: Vec<String> = std::iter::from_fn(|| queue.try_recv())
            .map(|m| m.to_string())
            .collect();
        assert_eq!(drained, vec!["7", "8", "9"]);
    }

    #[test]
    fn test_offer_after_close() {
        let queue = SubscriberQueue::new(2);
        queue.close();
        assert_eq!(queue.offer(msg("late")), Delivery::Closed);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_offer() {
        let queue = Arc::new(SubscriberQueue::new(2));
        let reader = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.recv().await })
        };

        tokio::task::yield_now().await;
        queue.offer(msg("hello"));

        let got = reader.await.unwrap();
        assert_eq!(got.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = SubscriberQueue::new(2);
        queue.offer(msg("last"));
        queue.close();

        assert_eq!(queue.recv().await.as_deref(), Some("last"));
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_deadline_when_idle() {
        let queue = SubscriberQueue::new(2);
        let deadline = Instant::now() + Duration::from_secs(30);
        let result = queue.recv_deadline(deadline).await;
        assert!(result.is_err());
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_deadline_returns_queued_message() {
        let queue = SubscriberQueue::new(2);
        queue.offer(msg("tick"));
        let deadline = Instant::now() + Duration::from_secs(30);
        let result = queue.recv_deadline(deadline).await;
        assert_eq!(result.unwrap().as_deref(), Some("tick"));
    }
}
