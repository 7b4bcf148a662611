//! Broker: latest-value cache and subscriber fan-out
//!
//! Single authoritative copy of the current ticker per symbol. Decouples the
//! feed listener from any number of arbitrarily slow subscribers.
//!
//! Registry and cache share one mutex. Publish only holds it long enough to
//! replace the cache entry and copy the queue list; per-subscriber enqueue
//! happens after the lock is released.

use crate::core::{OutboundMessage, SharedMessage, TickerUpdate};
use crate::exchanges::traits::UpdateSink;
use crate::hot_path::queue::{Delivery, SubscriberQueue};
use crate::infrastructure::metrics::MetricsCollector;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Subscriber identifier, unique for the process lifetime
pub type SubscriberId = u64;

/// Receive side of a registration, held by the gateway session
pub struct Subscription {
    pub id: SubscriberId,
    pub queue: Arc<SubscriberQueue>,
}

/// State guarded by the broker lock
struct BrokerState {
    latest: HashMap<String, TickerUpdate>,
    subscribers: HashMap<SubscriberId, Arc<SubscriberQueue>>,
    last_id: SubscriberId,
}

/// In-memory broker
pub struct Broker {
    state: Mutex<BrokerState>,
    queue_capacity: usize,
    metrics: Arc<MetricsCollector>,
}

impl Broker {
    /// Create a broker whose subscriber queues hold `queue_capacity` messages
    pub fn new(queue_capacity: usize) -> Self {
        Self::with_metrics(queue_capacity, Arc::new(MetricsCollector::new()))
    }

    /// Create a broker reporting overflow counters into `metrics`
    pub fn with_metrics(queue_capacity: usize, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            state: Mutex::new(BrokerState {
                latest: HashMap::new(),
                subscribers: HashMap::new(),
                last_id: 0,
            }),
            queue_capacity: queue_capacity.max(1),
            metrics,
        }
    }

    /// Replace the cached entry for the symbol and broadcast it
    ///
    /// Never waits on a subscriber: full queues lose their oldest message.
    pub fn publish(&self, update: TickerUpdate) {
        let message = match OutboundMessage::Ticker(&update).to_shared() {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(target: "broker", "Failed to serialize ticker {}: {}", update.symbol, e);
                return;
            }
        };

        let queues: Vec<Arc<SubscriberQueue>> = {
            let mut state = self.state.lock();
            state.latest.insert(update.symbol.clone(), update);
            state.subscribers.values().cloned().collect()
        };

        self.metrics.record_published();
        self.fan_out(&queues, message);
    }

    fn fan_out(&self, queues: &[Arc<SubscriberQueue>], message: SharedMessage) {
        for queue in queues {
            match queue.offer(message.clone()) {
                Delivery::Queued | Delivery::Closed => {}
                Delivery::EvictedOldest => self.metrics.record_evicted(),
                Delivery::Dropped => {
                    self.metrics.record_dropped();
                    tracing::debug!(target: "broker", "Client queue still full; dropping message");
                }
            }
        }
    }

    /// Register a new subscriber
    ///
    /// If anything is cached the queue starts with one snapshot message, so it
    /// is always delivered before any ticker published afterwards.
    pub fn register(&self) -> Subscription {
        let queue = Arc::new(SubscriberQueue::new(self.queue_capacity));

        let mut state = self.state.lock();
        state.last_id += 1;
        let id = state.last_id;
        state.subscribers.insert(id, queue.clone());

        if !state.latest.is_empty() {
            let cached: Vec<TickerUpdate> = state.latest.values().cloned().collect();
            match OutboundMessage::Snapshot(&cached).to_shared() {
                Ok(snapshot) => {
                    let _ = queue.offer(snapshot);
                }
                Err(e) => {
                    tracing::error!(target: "broker", "Failed to serialize snapshot: {}", e);
                }
            }
        }

        let total = state.subscribers.len();
        drop(state);

        tracing::info!(target: "broker", "Client {} connected. total_clients={}", id, total);
        Subscription { id, queue }
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn unregister(&self, id: SubscriberId) {
        let (removed, total) = {
            let mut state = self.state.lock();
            let removed = state.subscribers.remove(&id);
            (removed, state.subscribers.len())
        };

        if let Some(queue) = removed {
            queue.close();
            tracing::info!(target: "broker", "Client {} disconnected. total_clients={}", id, total);
        }
    }

    /// Point-in-time copy of every cached update, one per symbol
    pub fn latest(&self) -> Vec<TickerUpdate> {
        self.state.lock().latest.values().cloned().collect()
    }

    /// Cached update for one symbol
    pub fn get(&self, symbol: &str) -> Option<TickerUpdate> {
        self.state.lock().latest.get(symbol).cloned()
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }
}

impl UpdateSink for Broker {
    #[inline]
    fn publish(&self, update: TickerUpdate) {
        Broker::publish(self, update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ticker;
    use serde_json::Value;

    fn parse(msg: &str) -> Value {
        serde_json::from_str(msg).unwrap()
    }

    #[test]
    fn test_last_write_wins() {
        let broker = Broker::new(10);
        broker.publish(ticker("BTCUSDT", "100", 100));
        broker.publish(ticker("BTCUSDT", "200", 200));

        let latest = broker.latest();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].symbol, "BTCUSDT");
        assert_eq!(latest[0].timestamp, 200);
    }

    #[test]
    fn test_last_write_wins_across_symbols() {
        let broker = Broker::new(10);
        broker.publish(ticker("BTCUSDT", "1", 1));
        broker.publish(ticker("ETHUSDT", "2", 2));
        broker.publish(ticker("BTCUSDT", "3", 3));
        broker.publish(ticker("SOLUSDT", "4", 4));
        broker.publish(ticker("ETHUSDT", "5", 5));

        let mut latest = broker.latest();
        latest.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        let got: Vec<(&str, i64)> = latest.iter().map(|u| (u.symbol.as_str(), u.timestamp)).collect();
        assert_eq!(got, vec![("BTCUSDT", 3), ("ETHUSDT", 5), ("SOLUSDT", 4)]);
        assert_eq!(broker.get("ETHUSDT").map(|u| u.last_price), Some("5".to_string()));
        assert!(broker.get("DOGEUSDT").is_none());
    }

    #[test]
    fn test_ids_are_sequential() {
        let broker = Broker::new(4);
        let a = broker.register();
        let b = broker.register();
        broker.unregister(a.id);
        let c = broker.register();

        assert_eq!((a.id, b.id, c.id), (1, 2, 3));
        assert_eq!(broker.subscriber_count(), 2);
    }

    #[test]
    fn test_no_snapshot_when_cache_empty() {
        let broker = Broker::new(4);
        let sub = broker.register();
        assert!(sub.queue.is_empty());
    }

    #[test]
    fn test_snapshot_precedes_later_tickers() {
        let broker = Broker::new(10);
        broker.publish(ticker("BTCUSDT", "1", 1));
        broker.publish(ticker("ETHUSDT", "2", 2));

        let sub = broker.register();
        broker.publish(ticker("BTCUSDT", "3", 3));

        let first = parse(&sub.queue.try_recv().unwrap());
        assert_eq!(first["type"], "snapshot");
        let mut symbols: Vec<String> = first["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["symbol"].as_str().unwrap().to_string())
            .collect();
        symbols.sort();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);

        let second = parse(&sub.queue.try_recv().unwrap());
        assert_eq!(second["type"], "ticker");
        assert_eq!(second["data"]["timestamp"], 3);
    }

    #[test]
    fn test_overflow_is_bounded_and_keeps_newest() {
        let capacity = 5;
        let broker = Broker::new(capacity);
        let sub = broker.register();

        for ts in 0..50 {
            broker.publish(ticker("BTCUSDT", "1", ts));
            assert!(sub.queue.len() <= capacity);
        }

        let drained: Vec<Value> = std::iter::from_fn(|| sub.queue.try_recv())
            .map(|m| parse(&m))
            .collect();
        assert_eq!(drained.len(), capacity);
        assert_eq!(drained.last().unwrap()["data"]["timestamp"], 49);

        let stamps: Vec<i64> = drained.iter().map(|m| m["data"]["timestamp"].as_i64().unwrap()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_slow_subscriber_does_not_affect_others() {
        let broker = Broker::new(2);
        let slow = broker.register();
        let fast = broker.register();

        for ts in 0..5 {
            broker.publish(ticker("BTCUSDT", "1", ts));
            let msg = parse(&fast.queue.try_recv().unwrap());
            assert_eq!(msg["data"]["timestamp"], ts);
        }
        assert_eq!(slow.queue.len(), 2);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let broker = Broker::new(4);
        broker.unregister(42);
        let sub = broker.register();
        broker.unregister(sub.id);
        broker.unregister(sub.id);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_closes_queue() {
        let broker = Broker::new(4);
        let sub = broker.register();
        broker.unregister(sub.id);

        assert!(sub.queue.recv().await.is_none());
        broker.publish(ticker("BTCUSDT", "1", 1));
        assert!(sub.queue.is_empty());
    }

    #[test]
    fn test_overflow_counted_in_metrics() {
        let metrics = Arc::new(MetricsCollector::new());
        let broker = Broker::with_metrics(1, metrics.clone());
        let _sub = broker.register();

        broker.publish(ticker("BTCUSDT", "1", 1));
        broker.publish(ticker("BTCUSDT", "1", 2));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.updates_published, 2);
        assert_eq!(snapshot.messages_evicted, 1);
    }

    #[test]
    fn test_concurrent_publish_and_register() {
        let broker = Arc::new(Broker::new(8));
        let writer = {
            let broker = broker.clone();
            std::thread::spawn(move || {
                for ts in 0..500 {
                    broker.publish(ticker("BTCUSDT", "1", ts));
                }
            })
        };

        let mut subs = Vec::new();
        for _ in 0..50 {
            subs.push(broker.register());
        }
        writer.join().unwrap();

        for sub in &subs {
            assert!(sub.queue.len() <= 8);
        }
        assert_eq!(broker.latest()[0].timestamp, 499);
    }
}
