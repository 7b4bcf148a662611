//! Exchange abstraction traits
//!
//! The feed listener is generic over where normalized updates go, so it can
//! drive the broker in production and a recording sink in tests.

use crate::core::TickerUpdate;

/// Destination for normalized ticker updates
///
/// # Design Notes
/// - Generic parameter on the listener, no dynamic dispatch
/// - `publish` is synchronous and must return quickly; the receive loop
///   calls it inline for every update
pub trait UpdateSink: Send + Sync {
    fn publish(&self, update: TickerUpdate);
}

impl<T: UpdateSink + ?Sized> UpdateSink for std::sync::Arc<T> {
    #[inline]
    fn publish(&self, update: TickerUpdate) {
        (**self).publish(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<TickerUpdate>>);

    impl UpdateSink for Recorder {
        fn publish(&self, update: TickerUpdate) {
            self.0.lock().push(update);
        }
    }

    #[test]
    fn test_arc_forwards_to_inner_sink() {
        let recorder = Arc::new(Recorder::default());
        let sink: Arc<Recorder> = recorder.clone();
        UpdateSink::publish(&sink, TickerUpdate::new("BTCUSDT", "1", "2", 3));

        assert_eq!(recorder.0.lock().len(), 1);
    }
}
