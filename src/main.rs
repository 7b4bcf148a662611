//! Binance ticker relay
//!
//! # Architecture
//! - **core**: Ticker update and outbound wire messages
//! - **exchanges**: Binance feed listener and frame parsing
//! - **hot_path**: Latest-value cache and subscriber fan-out
//! - **ws**: Upstream WebSocket connection, keepalive and backoff
//! - **infrastructure**: Cold path (config, logging, metrics, rate limiting, api)

use std::sync::Arc;
use std::time::Duration;
use ticker_relay::exchanges::{BinanceListener, ListenerSettings};
use ticker_relay::hot_path::Broker;
use ticker_relay::infrastructure::{
    logging::init_logging, metrics::MetricsCollector, start_server, AppState, ConnectionLimiter,
    RateLimiter,
};
use ticker_relay::{Config, Result};
use tokio_util::sync::CancellationToken;

/// How long shutdown waits for the listener task
const LISTENER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Main application
pub struct RelayApp {
    config: Config,
    cancel: CancellationToken,
}

impl RelayApp {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Run until a shutdown signal arrives or the API server fails
    pub async fn run(&self) -> Result<()> {
        let config = &self.config;
        tracing::info!(
            "Starting ticker relay. Subscribed symbols: {:?}",
            config.feed.symbols
        );

        // 1. Shared components
        let metrics = Arc::new(MetricsCollector::new());
        let broker = Arc::new(Broker::with_metrics(
            config.broker.client_queue_size,
            metrics.clone(),
        ));

        // 2. Feed listener (hot path)
        let settings = ListenerSettings::from_config(&config.feed)?;
        let listener = BinanceListener::new(settings, broker.clone(), metrics.clone());
        let feed_state = listener.state();
        let listener_task = tokio::spawn(listener.run(self.cancel.clone()));

        // 3. Shutdown signal
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            cancel.cancel();
        });

        // 4. API server (cold path), returns once cancelled
        let state = AppState {
            broker,
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit.capacity,
                config.rate_limit.window(),
            )),
            metrics,
            feed_state,
            connections: Arc::new(ConnectionLimiter::new(
                config.api.max_ws_connections,
                config.api.max_ws_connections_per_ip,
            )),
            keepalive: config.api.keepalive(),
            cancel: self.cancel.clone(),
        };
        let served = start_server(&config.api, state).await;

        // 5. Stop the listener whatever ended the server
        self.cancel.cancel();
        if tokio::time::timeout(LISTENER_SHUTDOWN_TIMEOUT, listener_task)
            .await
            .is_err()
        {
            tracing::warn!("Listener did not stop in time");
        }

        tracing::info!("Service shutdown complete");
        served
    }
}

/// Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config file, apply APP_* overrides, validate
    let config = Config::from_environment()?;

    // Guards flush file logs on exit
    let _guards = init_logging(&config.logging)?;

    let app = RelayApp::new(config);
    app.run().await?;

    Ok(())
}
