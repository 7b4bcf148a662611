//! Exchange-specific implementations

pub mod binance;
pub mod parsing;
pub mod traits;

pub use binance::{stream_url, BinanceListener, ListenerSettings, ListenerState};
pub use parsing::{BinanceParser, FrameError};
pub use traits::UpdateSink;
