//! Hot path operations - no waiting on consumers
//!
//! This module contains the ingest-to-subscriber path:
//! - Latest-value cache
//! - Subscriber registry and fan-out
//! - Bounded drop-oldest queues

pub mod broker;
pub mod queue;

pub use broker::{Broker, SubscriberId, Subscription};
pub use queue::{Delivery, SubscriberQueue};
