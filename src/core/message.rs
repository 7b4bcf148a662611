//! Outbound messages sent to downstream subscribers
//!
//! Serialized once per publish and shared between every subscriber queue.

use super::TickerUpdate;
use serde::Serialize;
use std::sync::Arc;

/// Envelope for every message pushed to a subscriber
///
/// Wire shapes:
/// - `{"type":"ticker","data":{...}}`
/// - `{"type":"snapshot","data":[{...},...]}`
/// - `{"type":"keepalive"}`
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum OutboundMessage<'a> {
    Ticker(&'a TickerUpdate),
    Snapshot(&'a [TickerUpdate]),
    Keepalive,
}

/// Serialized message shared across subscriber queues
pub type SharedMessage = Arc<str>;

/// Pre-serialized keepalive frame
pub const KEEPALIVE: &str = r#"{"type":"keepalive"}"#;

impl OutboundMessage<'_> {
    /// Serialize to a shareable JSON string
    pub fn to_shared(&self) -> serde_json::Result<SharedMessage> {
        serde_json::to_string(self).map(Arc::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_wire_shape() {
        let update = TickerUpdate::new("BTCUSDT", "65000.12", "1.23", 1699977777444);
        let msg = OutboundMessage::Ticker(&update).to_shared().unwrap();
        assert_eq!(
            &*msg,
            r#"{"type":"ticker","data":{"symbol":"BTCUSDT","last_price":"65000.12","change_percent":"1.23","timestamp":1699977777444}}"#
        );
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let updates = vec![
            TickerUpdate::new("BTCUSDT", "1", "2", 3),
            TickerUpdate::new("ETHUSDT", "4", "5", 6),
        ];
        let msg = OutboundMessage::Snapshot(&updates).to_shared().unwrap();
        assert_eq!(
            &*msg,
            r#"{"type":"snapshot","data":[{"symbol":"BTCUSDT","last_price":"1","change_percent":"2","timestamp":3},{"symbol":"ETHUSDT","last_price":"4","change_percent":"5","timestamp":6}]}"#
        );
    }

    #[test]
    fn test_keepalive_wire_shape() {
        let msg = OutboundMessage::Keepalive.to_shared().unwrap();
        assert_eq!(&*msg, KEEPALIVE);
    }
}
