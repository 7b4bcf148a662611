//! Centralized logging setup
//!
//! Console output is always on. When a log directory is configured, logs are
//! also written to daily rolling files separated by log type:
//! - <dir>/main/  - Everything, JSON
//! - <dir>/error/ - Error and warning logs only
//! - <dir>/feed/  - Upstream feed listener
//! - <dir>/api/   - HTTP/WebSocket gateway

use crate::infrastructure::config::LoggingConfig;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::{filter_fn, LevelFilter},
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging
///
/// Filter comes from RUST_LOG when set, otherwise from `config.level`.
/// Returns WorkerGuards which must be kept alive for the duration of the program.
///
/// # Errors
/// Log directories cannot be created, or a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Vec<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(dir) = config.directory.as_deref() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer())
            .try_init()?;
        return Ok(Vec::new());
    };

    let mut guards = Vec::new();

    let (main_appender, guard) = create_appender(dir, "main")?;
    guards.push(guard);
    let (error_appender, guard) = create_appender(dir, "error")?;
    guards.push(guard);
    let (feed_appender, guard) = create_appender(dir, "feed")?;
    guards.push(guard);
    let (api_appender, guard) = create_appender(dir, "api")?;
    guards.push(guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(LevelFilter::WARN);

    let feed_layer = tracing_subscriber::fmt::layer()
        .with_writer(feed_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| metadata.target() == "feed"));

    let api_layer = tracing_subscriber::fmt::layer()
        .with_writer(api_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(filter_fn(|metadata| metadata.target() == "api"));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(feed_layer)
        .with(api_layer)
        .with(console_layer())
        .try_init()?;

    tracing::info!("Logging initialized. Log files in {}", dir.display());

    Ok(guards)
}

/// Console output, built per subscriber stack
fn console_layer<S>() -> tracing_subscriber::fmt::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
}

/// Create a daily rolling appender in `<dir>/<name>/`
fn create_appender(dir: &Path, name: &str) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    let sub_dir = dir.join(name);
    fs::create_dir_all(&sub_dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, sub_dir, name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_feed {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "feed", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_api {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "api", $level, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_appender_makes_subdirectory() {
        let dir = std::env::temp_dir().join(format!("relay-logs-{}", std::process::id()));
        fs::remove_dir_all(&dir).ok();

        let (_writer, _guard) = create_appender(&dir, "feed").unwrap();
        assert!(dir.join("feed").is_dir());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_init_with_log_directory() {
        let dir = std::env::temp_dir().join(format!("relay-init-logs-{}", std::process::id()));
        fs::remove_dir_all(&dir).ok();

        let config = LoggingConfig {
            level: "debug".to_string(),
            directory: Some(dir.clone()),
        };
        let guards = init_logging(&config).unwrap();
        assert_eq!(guards.len(), 4);
        for name in ["main", "error", "feed", "api"] {
            assert!(dir.join(name).is_dir());
        }

        // Global subscriber is already set
        assert!(init_logging(&LoggingConfig::default()).is_err());

        drop(guards);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_macros_expand_without_subscriber() {
        log_feed!(tracing::Level::INFO, "feed event {}", 1);
        log_api!(tracing::Level::DEBUG, "api event");
    }
}
