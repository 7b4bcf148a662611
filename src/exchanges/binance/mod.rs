//! Binance spot ticker feed listener
//!
//! Keeps one logical connection to the Binance `@ticker` streams for the
//! configured symbols, reconnecting with jittered backoff, and hands every
//! well-formed update to an `UpdateSink`.

use crate::exchanges::parsing::{preview, BinanceParser, FrameError};
use crate::exchanges::traits::UpdateSink;
use crate::infrastructure::config::{ConfigError, FeedConfig};
use crate::infrastructure::metrics::MetricsCollector;
use crate::log_feed;
use crate::ws::{Backoff, ConnectionConfig, PingHandler, WebSocketConnection, WebSocketError};

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use url::Url;

/// Build the stream URL for `symbols` on `base_url`
///
/// One symbol uses the dedicated stream path, several use the combined
/// stream endpoint in configured order.
pub fn stream_url(base_url: &str, symbols: &[String]) -> Result<Url, ConfigError> {
    let base = base_url.trim().trim_end_matches('/');
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@ticker", s.trim().to_lowercase()))
        .collect();

    let raw = match streams.as_slice() {
        [] => return Err(ConfigError::Invalid("no symbols configured".to_string())),
        [single] => format!("{base}/ws/{single}"),
        many => format!("{base}/stream?streams={}", many.join("/")),
    };

    let url = Url::parse(&raw)
        .map_err(|e| ConfigError::Invalid(format!("invalid stream URL {raw:?}: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::Invalid(format!(
            "stream URL must use ws or wss, got {other}"
        ))),
    }
}

/// Listener lifecycle, observable through `BinanceListener::state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Connected,
    BackingOff,
    /// Terminal
    Stopped,
}

impl ListenerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerState::Disconnected => "disconnected",
            ListenerState::Connecting => "connecting",
            ListenerState::Connected => "connected",
            ListenerState::BackingOff => "backing_off",
            ListenerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the run loop needs to (re)connect
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub url: Url,
    pub connection: ConnectionConfig,
    pub reconnect_min_delay: Duration,
    pub reconnect_max_delay: Duration,
}

impl ListenerSettings {
    pub fn from_config(feed: &FeedConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            url: stream_url(&feed.base_url, &feed.symbols)?,
            connection: feed.connection_config(),
            reconnect_min_delay: feed.reconnect_min_delay(),
            reconnect_max_delay: feed.reconnect_max_delay(),
        })
    }
}

/// How one connected session ended
enum SessionEnd {
    Stopped,
    Failed(WebSocketError),
}

/// Binance ticker feed listener
///
/// Generic over the sink so the receive loop calls `publish` without
/// dynamic dispatch.
pub struct BinanceListener<S: UpdateSink> {
    settings: ListenerSettings,
    sink: S,
    metrics: Arc<MetricsCollector>,
    state: watch::Sender<ListenerState>,
}

impl<S: UpdateSink> BinanceListener<S> {
    pub fn new(settings: ListenerSettings, sink: S, metrics: Arc<MetricsCollector>) -> Self {
        let (state, _) = watch::channel(ListenerState::Disconnected);
        Self {
            settings,
            sink,
            metrics,
            state,
        }
    }

    /// Watch the listener state
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ListenerState) {
        self.state.send_replace(state);
    }

    /// Run until `cancel` fires
    ///
    /// Connection-level failures never escape: they are logged and retried
    /// after a backoff delay. Cancellation aborts an in-flight connect, the
    /// receive loop and the backoff wait.
    pub async fn run(self, cancel: CancellationToken) {
        let url = self.settings.url.to_string();
        let mut backoff = Backoff::new(
            self.settings.reconnect_min_delay,
            self.settings.reconnect_max_delay,
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.set_state(ListenerState::Connecting);
            log_feed!(Level::INFO, "Connecting to {}", url);

            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = WebSocketConnection::connect(&url, &self.settings.connection) => res,
            };

            let failure = match connected {
                Ok(mut conn) => {
                    backoff.reset();
                    self.set_state(ListenerState::Connected);
                    self.metrics.set_feed_connected(true);
                    log_feed!(Level::INFO, "Connected to Binance stream");

                    let end = self.receive_loop(&mut conn, &cancel).await;
                    self.metrics.set_feed_connected(false);

                    match end {
                        SessionEnd::Stopped => {
                            let _ = tokio::time::timeout(Duration::from_secs(1), conn.close()).await;
                            break;
                        }
                        SessionEnd::Failed(e) => e,
                    }
                }
                Err(e) => e,
            };

            log_feed!(Level::ERROR, "Binance feed error: {}", failure);
            self.set_state(ListenerState::BackingOff);
            self.metrics.record_reconnect();

            let delay = backoff.next_delay();
            log_feed!(Level::WARN, "Reconnecting in {:.2}s", delay.as_secs_f64());

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ListenerState::Stopped);
        log_feed!(Level::INFO, "Binance listener stopped");
    }

    async fn receive_loop(
        &self,
        conn: &mut WebSocketConnection,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let ping_interval = self.settings.connection.ping_interval;
        let mut liveness = PingHandler::new(ping_interval, self.settings.connection.ping_timeout);
        let mut ping_tick = interval_at(Instant::now() + ping_interval, ping_interval);
        ping_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionEnd::Stopped,
                _ = ping_tick.tick() => {
                    if liveness.is_stale() {
                        return SessionEnd::Failed(WebSocketError::Timeout);
                    }
                    if let Err(e) = conn.send_ping().await {
                        return SessionEnd::Failed(e);
                    }
                }
                msg = conn.recv() => match msg {
                    Ok(Some(Message::Text(text))) => {
                        liveness.record_activity();
                        self.handle_frame(text.as_str());
                    }
                    Ok(Some(Message::Close(_))) | Ok(None) => {
                        return SessionEnd::Failed(WebSocketError::ConnectionClosed);
                    }
                    // Binary, ping and pong only prove the link is alive
                    Ok(Some(_)) => liveness.record_activity(),
                    Err(e) => return SessionEnd::Failed(e),
                },
            }
        }
    }

    /// Decode one text frame and publish it; bad frames cost only themselves
    pub(crate) fn handle_frame(&self, text: &str) -> bool {
        self.metrics.record_frame();

        match BinanceParser::parse_ticker(text) {
            Ok(update) => {
                self.sink.publish(update);
                true
            }
            Err(FrameError::Decode(_)) => {
                self.metrics.record_decode_error();
                log_feed!(
                    Level::WARN,
                    "Invalid JSON from Binance (truncated): {}",
                    preview(text)
                );
                false
            }
            Err(e) => {
                self.metrics.record_invalid_update();
                log_feed!(Level::DEBUG, "Skipping ticker frame: {}", e);
                false
            }
        }
    }
}
