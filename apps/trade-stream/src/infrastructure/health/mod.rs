//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, stream status reporting, and Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (feed connected, replay finished)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::domain::streaming::{FeedConnectionState, ReplayPhase, StreamState};
use crate::infrastructure::broadcast::SubscriberRegistry;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Upstream feed status.
    pub feed: FeedInfo,
    /// Replay status.
    pub replay: ReplayInfo,
    /// Subscriber status.
    pub subscribers: SubscriberInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Feed connected and publishing live.
    Healthy,
    /// Feed connected, replay still running.
    Degraded,
    /// Feed not connected.
    Unhealthy,
}

/// Upstream feed status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection state.
    pub state: FeedConnectionState,
    /// Whether the feed is connected.
    pub connected: bool,
    /// Symbols in the last discovered set.
    pub symbols: u64,
    /// Raw messages received.
    pub messages_received: u64,
    /// Messages that failed to decode.
    pub decode_errors: u64,
    /// Reconnect attempts since startup.
    pub reconnect_attempts: u64,
    /// Last successful connection.
    pub last_connected_at: Option<DateTime<Utc>>,
}

/// Replay status.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayInfo {
    /// Replay phase.
    pub phase: ReplayPhase,
    /// Trades published from the cache.
    pub trades_replayed: u64,
}

/// Subscriber status.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberInfo {
    /// Registered subscribers.
    pub total: usize,
    /// Fan-out mode.
    pub fanout: &'static str,
    /// Trades published (replayed and live).
    pub trades_published: u64,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    stream_state: Arc<StreamState>,
    registry: Arc<SubscriberRegistry>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        stream_state: Arc<StreamState>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            stream_state,
            registry,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Build the health router.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state).await;
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let stream = &state.stream_state;
    let status = determine_health_status(stream.feed_state(), stream.replay_phase());

    if status == HealthStatus::Healthy {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

async fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let stream = &state.stream_state;
    let feed_state = stream.feed_state();
    let replay_phase = stream.replay_phase();

    HealthResponse {
        status: determine_health_status(feed_state, replay_phase),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed: FeedInfo {
            state: feed_state,
            connected: feed_state == FeedConnectionState::Connected,
            symbols: stream.symbol_count(),
            messages_received: stream.messages_received(),
            decode_errors: stream.decode_errors(),
            reconnect_attempts: stream.reconnect_attempts(),
            last_connected_at: stream.last_connected_at(),
        },
        replay: ReplayInfo {
            phase: replay_phase,
            trades_replayed: stream.trades_replayed(),
        },
        subscribers: SubscriberInfo {
            total: state.registry.subscriber_count().await,
            fanout: state.registry.mode().as_str(),
            trades_published: stream.trades_published(),
        },
    }
}

fn determine_health_status(feed: FeedConnectionState, replay: ReplayPhase) -> HealthStatus {
    match (feed, replay) {
        (FeedConnectionState::Connected, ReplayPhase::Replaying) => HealthStatus::Degraded,
        (FeedConnectionState::Connected, _) => HealthStatus::Healthy,
        _ => HealthStatus::Unhealthy,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
