//! Market data types
//!
//! `TickerUpdate` is the normalized form of one upstream ticker event. It is
//! what the broker caches per symbol and what subscribers receive on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized 24h ticker update
///
/// Prices stay as the exact decimal text received from upstream so no
/// floating-point rounding is ever introduced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerUpdate {
    /// Trading pair symbol (e.g. `BTCUSDT`)
    pub symbol: String,
    /// Last traded price, decimal text
    pub last_price: String,
    /// 24h price change percentage, decimal text
    pub change_percent: String,
    /// Event time (milliseconds since epoch)
    pub timestamp: i64,
}

/// Reasons an upstream object cannot become a `TickerUpdate`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` has an invalid type or value")]
    InvalidField(&'static str),
}

impl TickerUpdate {
    /// Create new ticker update
    pub fn new(
        symbol: impl Into<String>,
        last_price: impl Into<String>,
        change_percent: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            last_price: last_price.into(),
            change_percent: change_percent.into(),
            timestamp,
        }
    }

    /// Build from a Binance 24hr ticker object
    ///
    /// Works for both envelopes once the payload has been unwrapped:
    /// ```text
    /// {"e":"24hrTicker","E":1699999999000,"s":"BTCUSDT","c":"65000.01","P":"2.15",...}
    /// ```
    /// `s` must be a string, `c` and `P` a string or number, `E` an integer.
    pub fn from_binance(obj: &Map<String, Value>) -> Result<Self, ValidationError> {
        let symbol = match required(obj, "s")? {
            Value::String(s) => s.clone(),
            _ => return Err(ValidationError::InvalidField("s")),
        };
        let last_price = decimal_text(required(obj, "c")?, "c")?;
        let change_percent = decimal_text(required(obj, "P")?, "P")?;
        let timestamp = required(obj, "E")?
            .as_i64()
            .ok_or(ValidationError::InvalidField("E"))?;

        Ok(Self {
            symbol,
            last_price,
            change_percent,
            timestamp,
        })
    }
}

/// Fetch a field, treating JSON `null` the same as absence
#[inline]
fn required<'a>(obj: &'a Map<String, Value>, key: &'static str) -> Result<&'a Value, ValidationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(key)),
        Some(v) => Ok(v),
    }
}

#[inline]
fn decimal_text(value: &Value, key: &'static str) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ValidationError::InvalidField(key)),
    }
}
