//! Configuration management for the ticker relay
//!
//! Loads configuration from config.toml at startup, then lets `APP_*`
//! environment variables override individual options.
//! All values are configurable to avoid hardcoded constants.

use crate::exchanges::binance::stream_url;
use crate::ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Relay configuration
///
/// Loaded from config.toml at startup. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Upstream feed settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Fan-out settings
    #[serde(default)]
    pub broker: BrokerConfig,

    /// `/price` rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// API server settings
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream Binance feed configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Symbols to relay, uppercase (e.g. BTCUSDT)
    pub symbols: Vec<String>,
    /// Stream host, without path
    pub base_url: String,
    pub reconnect_min_delay_secs: f64,
    pub reconnect_max_delay_secs: f64,
    pub ping_interval_secs: f64,
    pub ping_timeout_secs: f64,
    pub handshake_timeout_secs: f64,
    /// Largest accepted upstream frame in bytes
    pub max_frame_size: usize,
}

/// Broker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Per-subscriber queue capacity
    pub client_queue_size: usize,
}

/// Sliding-window limiter for `/price`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window per client
    pub capacity: usize,
    pub window_secs: f64,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Concurrent `/ws` sessions across all clients
    pub max_ws_connections: usize,
    /// Concurrent `/ws` sessions from one IP
    pub max_ws_connections_per_ip: usize,
    /// Idle time before a session gets a keepalive message
    pub keepalive_secs: f64,
    /// `*` allows any origin
    pub cors_allow_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Directory for rolling log files; console only when unset
    pub directory: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            base_url: "wss://stream.binance.com:9443".to_string(),
            reconnect_min_delay_secs: 1.0,
            reconnect_max_delay_secs: 30.0,
            ping_interval_secs: 20.0,
            ping_timeout_secs: 20.0,
            handshake_timeout_secs: 20.0,
            max_frame_size: 1 << 20,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            client_queue_size: 100,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 120,
            window_secs: 60.0,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_ws_connections: 200,
            max_ws_connections_per_ip: 10,
            keepalive_secs: 30.0,
            cors_allow_origins: vec!["*".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

// Accessors clamp on their own, so an unvalidated config still yields
// usable timings.
impl FeedConfig {
    #[inline]
    pub fn reconnect_min_delay(&self) -> Duration {
        secs(
            self.reconnect_min_delay_secs,
            Self::default().reconnect_min_delay_secs,
        )
    }

    /// Never below the minimum delay
    #[inline]
    pub fn reconnect_max_delay(&self) -> Duration {
        secs(
            self.reconnect_max_delay_secs,
            Self::default().reconnect_max_delay_secs,
        )
        .max(self.reconnect_min_delay())
    }

    /// Handshake, ping and frame-size settings for the upstream socket
    pub fn connection_config(&self) -> ConnectionConfig {
        let defaults = Self::default();
        let max_frame_size = if self.max_frame_size == 0 {
            defaults.max_frame_size
        } else {
            self.max_frame_size
        };
        ConnectionConfig {
            handshake_timeout: secs(self.handshake_timeout_secs, defaults.handshake_timeout_secs),
            ping_interval: secs(self.ping_interval_secs, defaults.ping_interval_secs),
            ping_timeout: secs(self.ping_timeout_secs, defaults.ping_timeout_secs),
            max_frame_size,
        }
    }
}

impl RateLimitConfig {
    #[inline]
    pub fn window(&self) -> Duration {
        secs(self.window_secs, 1.0).max(Duration::from_secs(1))
    }
}

impl ApiConfig {
    #[inline]
    pub fn keepalive(&self) -> Duration {
        secs(self.keepalive_secs, Self::default().keepalive_secs)
    }

    /// Resolve `host:port`, first address wins
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| {
                ConfigError::Invalid(format!("cannot bind to {}:{}", self.host, self.port))
            })
    }
}

/// Longest accepted timing in seconds (one year)
const MAX_TIMING_SECS: f64 = 365.0 * 86_400.0;

/// Seconds to `Duration`
///
/// Non-positive or non-finite values fall back to `fallback`. The result is
/// kept between one millisecond and `MAX_TIMING_SECS` so timers never see a
/// zero period or an `Instant` overflow.
fn secs(value: f64, fallback: f64) -> Duration {
    Duration::from_secs_f64(positive_or(value, fallback).min(MAX_TIMING_SECS))
        .max(Duration::from_millis(1))
}

impl Config {
    /// Load configuration file, apply environment overrides and validate
    ///
    /// # Errors
    /// Malformed file, unparsable environment value, or invalid settings.
    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut config = Self::load()?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the file named by CONFIG_PATH (default config.toml)
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(config_path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => {
                toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Apply `APP_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).map(|raw| (key, raw));

        if let Some((key, raw)) = get("APP_SYMBOLS") {
            self.feed.symbols = parse_list(key, &raw)?
                .into_iter()
                .map(|s| s.to_uppercase())
                .collect();
        }
        if let Some((_, raw)) = get("APP_BINANCE_BASE_URL") {
            self.feed.base_url = raw.trim().to_string();
        }
        if let Some((key, raw)) = get("APP_RECONNECT_MIN_DELAY") {
            self.feed.reconnect_min_delay_secs = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_RECONNECT_MAX_DELAY") {
            self.feed.reconnect_max_delay_secs = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_PING_INTERVAL") {
            self.feed.ping_interval_secs = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_PING_TIMEOUT") {
            self.feed.ping_timeout_secs = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_HANDSHAKE_TIMEOUT") {
            self.feed.handshake_timeout_secs = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_MAX_FRAME_SIZE") {
            self.feed.max_frame_size = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_CLIENT_QUEUE_SIZE") {
            self.broker.client_queue_size = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_PRICE_RATE_LIMIT_PER_MINUTE") {
            self.rate_limit.capacity = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_RATE_LIMIT_WINDOW") {
            self.rate_limit.window_secs = parse_value(key, &raw)?;
        }
        if let Some((_, raw)) = get("APP_HOST") {
            self.api.host = raw.trim().to_string();
        }
        if let Some((key, raw)) = get("APP_PORT") {
            self.api.port = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_MAX_WS_CONNECTIONS") {
            self.api.max_ws_connections = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_MAX_WS_CONNECTIONS_PER_IP") {
            self.api.max_ws_connections_per_ip = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_KEEPALIVE") {
            self.api.keepalive_secs = parse_value(key, &raw)?;
        }
        if let Some((key, raw)) = get("APP_CORS_ALLOW_ORIGINS") {
            self.api.cors_allow_origins = parse_list(key, &raw)?;
        }
        if let Some((_, raw)) = get("APP_LOG_LEVEL") {
            self.logging.level = raw.trim().to_string();
        }
        if let Some((_, raw)) = get("APP_LOG_DIR") {
            let raw = raw.trim();
            self.logging.directory = (!raw.is_empty()).then(|| PathBuf::from(raw));
        }

        Ok(())
    }

    /// Reject unusable settings and clamp out-of-range timings
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let defaults = FeedConfig::default();
        let feed = &mut self.feed;

        feed.symbols = feed
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if feed.symbols.is_empty() {
            return Err(ConfigError::Invalid("no symbols configured".to_string()));
        }
        stream_url(&feed.base_url, &feed.symbols)?;

        feed.reconnect_min_delay_secs =
            positive_or(feed.reconnect_min_delay_secs, defaults.reconnect_min_delay_secs);
        feed.reconnect_max_delay_secs =
            positive_or(feed.reconnect_max_delay_secs, defaults.reconnect_max_delay_secs)
                .max(feed.reconnect_min_delay_secs);
        feed.ping_interval_secs = positive_or(feed.ping_interval_secs, defaults.ping_interval_secs);
        feed.ping_timeout_secs = positive_or(feed.ping_timeout_secs, defaults.ping_timeout_secs);
        feed.handshake_timeout_secs =
            positive_or(feed.handshake_timeout_secs, defaults.handshake_timeout_secs);
        if feed.max_frame_size == 0 {
            feed.max_frame_size = defaults.max_frame_size;
        }

        self.broker.client_queue_size = self.broker.client_queue_size.max(1);
        self.rate_limit.capacity = self.rate_limit.capacity.max(1);
        self.rate_limit.window_secs = positive_or(self.rate_limit.window_secs, 1.0).max(1.0);
        self.api.keepalive_secs =
            positive_or(self.api.keepalive_secs, ApiConfig::default().keepalive_secs);

        self.api.bind_addr()?;
        Ok(())
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key,
        message: e.to_string(),
    })
}

/// Comma-separated (`a,b`) or JSON array (`["a","b"]`); blanks dropped
fn parse_list(key: &'static str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let raw = raw.trim();
    let items: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).map_err(|e| ConfigError::Env {
            key,
            message: e.to_string(),
        })?
    } else {
        raw.split(',').map(str::to_string).collect()
    };

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Parse error (invalid TOML)
    #[error("Failed to parse config: {0}")]
    Parse(String),
    /// Unparsable environment override
    #[error("Invalid value for {key}: {message}")]
    Env { key: &'static str, message: String },
    /// Settings that cannot run
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
