//! Test utilities shared by unit tests

use crate::core::TickerUpdate;

/// Ticker update with a fixed change percent
pub fn ticker(symbol: &str, last_price: &str, timestamp: i64) -> TickerUpdate {
    TickerUpdate::new(symbol, last_price, "0.00", timestamp)
}

/// Raw single-stream frame as Binance sends it
pub fn binance_frame(symbol: &str, last_price: &str, change: &str, event_time: i64) -> String {
    format!(
        r#"{{"e":"24hrTicker","E":{event_time},"s":"{symbol}","p":"1.0","P":"{change}","c":"{last_price}","Q":"0.1","o":"64000.00"}}"#
    )
}

/// Raw multiplexed frame wrapping a single-stream frame
pub fn combined_frame(symbol: &str, last_price: &str, change: &str, event_time: i64) -> String {
    format!(
        r#"{{"stream":"{}@ticker","data":{}}}"#,
        symbol.to_lowercase(),
        binance_frame(symbol, last_price, change, event_time)
    )
}
