//! Binance message parser
//!
//! Parses Binance 24hr ticker frames into `TickerUpdate`.
//! Accepts both stream envelopes:
//! - single stream (`/ws/<symbol>@ticker`): the ticker object itself
//! - combined stream (`/stream?streams=...`): `{"stream": "...", "data": {...}}`

use super::FrameError;
use crate::core::TickerUpdate;
use serde_json::Value;

/// Binance message parser
pub struct BinanceParser;

impl BinanceParser {
    /// Parse one text frame into a ticker update
    ///
    /// Binance 24hrTicker format (fields used):
    /// {
    ///   "e": "24hrTicker",
    ///   "E": 1672515782136,
    ///   "s": "BNBBTC",
    ///   "P": "250.00",
    ///   "c": "0.0025",
    ///   ...
    /// }
    pub fn parse_ticker(text: &str) -> Result<TickerUpdate, FrameError> {
        let frame: Value = serde_json::from_str(text)?;
        Self::ticker_from_value(frame)
    }

    /// Unwrap the envelope of an already-decoded frame and extract the ticker
    pub fn ticker_from_value(frame: Value) -> Result<TickerUpdate, FrameError> {
        let payload = Self::unwrap_envelope(frame);
        match payload {
            Value::Object(ref obj) => Ok(TickerUpdate::from_binance(obj)?),
            _ => Err(FrameError::NotAnObject),
        }
    }

    /// Use the nested `data` payload when present, the frame itself otherwise
    #[inline]
    pub fn unwrap_envelope(frame: Value) -> Value {
        match frame {
            Value::Object(mut obj) => match obj.remove("data") {
                Some(data) => data,
                None => Value::Object(obj),
            },
            other => other,
        }
    }
}
