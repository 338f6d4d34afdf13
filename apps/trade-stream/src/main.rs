//! Trade Stream Binary
//!
//! Starts Binance aggTrade ingestion with cache replay and subscriber fan-out.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trade-stream
//! ```
//!
//! # Environment Variables
//!
//! All optional.
//! - `TRADE_STREAM_CACHE_BACKEND`: redis | memory | none (default: redis when `REDIS_URL` is set, otherwise none)
//! - `REDIS_URL`: Redis connection URL
//! - `TRADE_STREAM_CACHE_KEY`: Redis list key (default: binance.trades)
//! - `TRADE_STREAM_RETENTION_SECS`: Cache retention window (default: 7200)
//! - `BINANCE_REST_URL`: REST base URL (default: <https://api.binance.com>)
//! - `BINANCE_STREAM_URL`: Stream base URL (default: <wss://stream.binance.com:9443>)
//! - `TRADE_STREAM_QUOTE_ASSET`: Only stream symbols quoted in this asset
//! - `TRADE_STREAM_DISCOVERY_RETRY_MS`: Wait after failed discovery (default: 1000)
//! - `TRADE_STREAM_RECONNECT_DELAY_INITIAL_MS`: First reconnect delay (default: 1000)
//! - `TRADE_STREAM_RECONNECT_DELAY_MAX_SECS`: Reconnect delay cap (default: 1)
//! - `TRADE_STREAM_RECONNECT_DELAY_MULTIPLIER`: Backoff multiplier (default: 1.0)
//! - `TRADE_STREAM_RECONNECT_JITTER`: Backoff jitter fraction (default: 0.0)
//! - `TRADE_STREAM_HANDOFF_CAPACITY`: Replay/live channel capacity (default: 1)
//! - `TRADE_STREAM_FANOUT_MODE`: blocking | drop (default: blocking)
//! - `TRADE_STREAM_SUBSCRIBER_BUFFER`: Per-subscriber buffer in drop mode (default: 1024)
//! - `TRADE_STREAM_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: trade-stream)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use trade_stream::infrastructure::binance::{
    BinanceFeedClient, BinanceSymbolDiscovery, BinanceTradeDecoder,
};
use trade_stream::infrastructure::cache::{InMemoryCacheStore, RedisCacheStore};
use trade_stream::infrastructure::health::{HealthServer, HealthServerState};
use trade_stream::infrastructure::telemetry;
use trade_stream::{
    CacheBackend, CacheStorePort, ServiceConfig, StreamPorts, Subscription, TradeStream,
    TradeTally, init_metrics,
};

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between throughput log lines.
const THROUGHPUT_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Trade Stream");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = ServiceConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let store = build_cache_store(&config).await;

    let ports = StreamPorts {
        discovery: Arc::new(BinanceSymbolDiscovery::new(
            config.binance.rest_url.clone(),
            config.binance.quote_asset.clone(),
        )?),
        feed: Arc::new(BinanceFeedClient::new(config.binance.stream_url.clone())),
        decoder: Arc::new(BinanceTradeDecoder::new()),
    };

    let stream = Arc::new(TradeStream::new(ports, store, config.trade_stream_config()).await);

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        stream.state(),
        stream.registry(),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        Arc::clone(&health_state),
        shutdown_token.clone(),
    );

    // Spawn health server
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Subscribe before starting so replayed trades are counted too
    let subscription = stream.subscribe().await;
    tokio::spawn(report_throughput(subscription, shutdown_token.clone()));

    // Spawn the stream
    let stream_task = Arc::clone(&stream);
    tokio::spawn(async move {
        stream_task.start().await;
        tracing::warn!("Trade stream stopped");
    });

    tracing::info!(cache_enabled = stream.cache_enabled(), "Trade stream ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Trade stream stopped");
    Ok(())
}

/// Build the configured cache store.
///
/// A Redis store that cannot be reached at startup is dropped and the
/// stream runs live-only.
async fn build_cache_store(config: &ServiceConfig) -> Option<Arc<dyn CacheStorePort>> {
    match &config.cache.backend {
        CacheBackend::Redis { url } => match RedisCacheStore::connect(url, config.cache.key.clone()).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, running live-only");
                None
            }
        },
        CacheBackend::Memory => Some(Arc::new(InMemoryCacheStore::new())),
        CacheBackend::Disabled => None,
    }
}

/// Log trade throughput until shutdown or until the stream stops.
async fn report_throughput(mut subscription: Subscription, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(THROUGHPUT_INTERVAL);
    interval.tick().await;

    let mut window = TradeTally::default();
    let mut total: u64 = 0;
    let mut last_symbol: Option<String> = None;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            trade = subscription.recv() => {
                let Some(trade) = trade else { break };
                window.record(&trade);
                total += 1;
                last_symbol = Some(trade.symbol);
            }
            _ = interval.tick() => {
                let tally = window.take();
                tracing::info!(
                    subscriber = %subscription.id(),
                    aggregates = tally.aggregates,
                    trades = tally.trades,
                    notional = %tally.notional,
                    total,
                    last_symbol = last_symbol.as_deref().unwrap_or("-"),
                    "Trade throughput"
                );
            }
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        cache_backend = config.cache.backend.as_str(),
        cache_key = %config.cache.key,
        retention_secs = config.cache.retention.as_secs(),
        fanout = config.fanout.as_str(),
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        rest_url = %config.binance.rest_url,
        stream_url = %config.binance.stream_url,
        quote_asset = ?config.binance.quote_asset,
        "Binance endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
