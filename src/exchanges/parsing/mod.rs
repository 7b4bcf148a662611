//! JSON frame decoding for exchange messages
//!
//! One upstream frame in, at most one `TickerUpdate` out. Errors here only
//! ever cost the single frame that caused them.

pub mod binance;

pub use binance::BinanceParser;

use crate::core::ValidationError;

/// Why a single frame produced no update
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not valid JSON
    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    /// Valid JSON, but the payload is not an object
    #[error("payload is not an object")]
    NotAnObject,
    /// Object is missing ticker fields or has wrong types
    #[error("invalid ticker: {0}")]
    Invalid(#[from] ValidationError),
}

/// Longest prefix of raw text included in log lines
pub const LOG_PREVIEW_CHARS: usize = 200;

/// Truncate raw frame text for logging, on a char boundary
#[inline]
pub fn preview(text: &str) -> &str {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
