//! Core types shared by the feed, the broker and the gateway
//!
//! - TickerUpdate: normalized upstream ticker event
//! - OutboundMessage: envelope pushed to downstream subscribers

pub mod market_data;
pub mod message;

pub use market_data::{TickerUpdate, ValidationError};
pub use message::{OutboundMessage, SharedMessage, KEEPALIVE};
