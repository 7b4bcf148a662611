//! API Server (Cold Path)
//!
//! HTTP and WebSocket gateway in front of the broker:
//! - `GET /latest`  - every cached ticker
//! - `GET /price`   - one ticker (or all), rate limited per client IP
//! - `GET /healthz` - feed state, subscriber count and counters
//! - `GET /ws`      - snapshot then live ticker stream with idle keepalives

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::Level;

use crate::core::{TickerUpdate, KEEPALIVE};
use crate::exchanges::ListenerState;
use crate::hot_path::{Broker, SubscriberQueue};
use crate::infrastructure::config::ApiConfig;
use crate::infrastructure::connection_limit::{ConnectionLimiter, ConnectionSlot};
use crate::infrastructure::metrics::{MetricsCollector, MetricsSnapshot};
use crate::infrastructure::rate_limiter::RateLimiter;
use crate::{log_api, RelayError};

/// `{"data": ...}` wrapper
#[derive(Debug, Serialize)]
pub struct DataDto<T> {
    pub data: T,
}

/// Error body, `{"detail": "..."}`
#[derive(Debug, Serialize)]
pub struct DetailDto {
    pub detail: String,
}

/// Health endpoint response
#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub feed: ListenerState,
    pub subscribers: usize,
    pub ws_connections: usize,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub symbol: Option<String>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsCollector>,
    pub feed_state: watch::Receiver<ListenerState>,
    pub connections: Arc<ConnectionLimiter>,
    /// Idle time before a session gets a keepalive message
    pub keepalive: Duration,
    /// Ends open sessions and the server itself
    pub cancel: CancellationToken,
}

fn detail(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(DetailDto {
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// CORS policy from configured origins; `*` allows any origin
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, RelayError> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o.trim() == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o.trim())
                .map_err(|e| RelayError::Parse(format!("invalid CORS origin {o:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Build the gateway router
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/latest", get(get_latest))
        .route("/price", get(get_price))
        .route("/healthz", get(get_health))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind and run the API server until the cancel token fires
pub async fn start_server(config: &ApiConfig, state: AppState) -> Result<(), RelayError> {
    let addr = config.bind_addr()?;
    let cors = cors_layer(&config.cors_allow_origins)?;

    let listener = TcpListener::bind(addr).await?;
    log_api!(Level::INFO, "API Server listening on {}", addr);

    serve(listener, router(state.clone(), cors), state.cancel).await
}

/// Serve `app` on an already bound listener with graceful shutdown
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> Result<(), RelayError> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await?;

    log_api!(Level::INFO, "API Server stopped");
    Ok(())
}

/// Handler for /latest
async fn get_latest(State(state): State<AppState>) -> Json<DataDto<Vec<TickerUpdate>>> {
    Json(DataDto {
        data: state.broker.latest(),
    })
}

/// Handler for /price
async fn get_price(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<PriceQuery>,
) -> Response {
    if !state.limiter.hit(&format!("price:{}", addr.ip())) {
        log_api!(Level::DEBUG, "Rate limited /price for {}", addr.ip());
        return detail(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests");
    }

    let symbol = query
        .symbol
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty());

    match symbol {
        Some(symbol) => match state.broker.get(&symbol) {
            Some(update) => Json(update).into_response(),
            None => detail(StatusCode::NOT_FOUND, format!("Symbol {symbol} not found")),
        },
        None => Json(DataDto {
            data: state.broker.latest(),
        })
        .into_response(),
    }
}

/// Handler for /healthz
async fn get_health(State(state): State<AppState>) -> Json<HealthDto> {
    let feed = *state.feed_state.borrow();
    Json(HealthDto {
        status: "ok",
        feed,
        subscribers: state.broker.subscriber_count(),
        ws_connections: state.connections.active(),
        metrics: state.metrics.snapshot(),
    })
}

/// Handler for /ws
///
/// Limits are checked before the upgrade so rejected clients get a plain 429.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let Some(slot) = state.connections.acquire(addr.ip()) else {
        log_api!(Level::WARN, "Rejecting WebSocket from {}: connection limit", addr);
        return detail(StatusCode::TOO_MANY_REQUESTS, "Too Many Connections");
    };

    ws.on_upgrade(move |socket| run_session(socket, state, slot))
}

/// Forward one subscriber queue to one client until either side goes away
async fn run_session(mut socket: WebSocket, state: AppState, slot: ConnectionSlot) {
    let subscription = state.broker.register();
    log_api!(
        Level::INFO,
        "WebSocket session {} opened from {}",
        subscription.id,
        slot.ip()
    );

    if let Err(e) = forward(&mut socket, &subscription.queue, &state).await {
        log_api!(Level::DEBUG, "WebSocket session {} ended: {}", subscription.id, e);
    }

    state.broker.unregister(subscription.id);
    let _ = socket.close().await;
    drop(slot);
}

async fn forward(
    socket: &mut WebSocket,
    queue: &SubscriberQueue,
    state: &AppState,
) -> Result<(), axum::Error> {
    // Only outbound sends push the keepalive deadline forward
    let mut deadline = Instant::now() + state.keepalive;
    loop {
        tokio::select! {
            biased;
            _ = state.cancel.cancelled() => return Ok(()),
            incoming = socket.recv() => match incoming {
                // Client messages are ignored; close or error ends the session
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
            },
            next = queue.recv_deadline(deadline) => {
                match next {
                    Ok(Some(msg)) => socket.send(Message::Text(msg.to_string())).await?,
                    // Unregistered elsewhere
                    Ok(None) => return Ok(()),
                    Err(_) => socket.send(Message::Text(KEEPALIVE.to_string())).await?,
                }
                deadline = Instant::now() + state.keepalive;
            }
        }
    }
}
