//! Live Ingestion Task
//!
//! Discovers the tradable symbol set, connects to the upstream feed and
//! forwards every decoded trade to the orchestrator. Raw payloads are
//! appended to the replay cache before decoding.
//!
//! # States
//!
//! ```text
//!            ┌────────────── read error ──────────────┐
//!            ▼                                         │
//!   ┌─────────────┐  symbols  ┌────────────┐  open  ┌─────────┐
//!   │ Discovering │──────────►│ Connecting │───────►│ Reading │
//!   └─────────────┘           └────────────┘        └─────────┘
//!      ▲       │ retry delay        │ backoff delay
//!      └───────┘◄───────────────────┘
//! ```
//!
//! There is no terminal failure state. The task only exits once the
//! orchestrator stops receiving.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::cache::ReplayCache;
use crate::application::ports::{FeedClientPort, FeedConnection, SymbolDiscoveryPort, TradeDecoder};
use crate::domain::streaming::{FeedConnectionState, StreamState};
use crate::domain::trade::{AggTrade, agg_trade_streams};
use crate::infrastructure::metrics;
use crate::infrastructure::reconnect::{ReconnectConfig, ReconnectPolicy};

/// Default wait between failed discovery attempts.
pub const DEFAULT_DISCOVERY_RETRY: Duration = Duration::from_secs(1);

/// Ingestion state.
enum IngestState {
    Discovering,
    Connecting { streams: Vec<String> },
    Reading { connection: Box<dyn FeedConnection> },
}

/// Why the read loop ended.
enum ReadOutcome {
    Disconnected,
    DownstreamClosed,
}

/// Timing for the ingestion loop.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Wait after a failed or empty discovery.
    pub discovery_retry: Duration,
    /// Delay policy after a failed connection attempt.
    pub reconnect: ReconnectConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            discovery_retry: DEFAULT_DISCOVERY_RETRY,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Long-running task feeding live trades to the orchestrator.
pub struct LiveIngestTask {
    discovery: Arc<dyn SymbolDiscoveryPort>,
    feed: Arc<dyn FeedClientPort>,
    decoder: Arc<dyn TradeDecoder>,
    cache: Option<ReplayCache>,
    tx: mpsc::Sender<AggTrade>,
    config: IngestConfig,
    state: Arc<StreamState>,
}

impl LiveIngestTask {
    /// Create a new ingestion task.
    #[must_use]
    pub fn new(
        discovery: Arc<dyn SymbolDiscoveryPort>,
        feed: Arc<dyn FeedClientPort>,
        decoder: Arc<dyn TradeDecoder>,
        cache: Option<ReplayCache>,
        tx: mpsc::Sender<AggTrade>,
        config: IngestConfig,
        state: Arc<StreamState>,
    ) -> Self {
        Self {
            discovery,
            feed,
            decoder,
            cache,
            tx,
            config,
            state,
        }
    }

    /// Run until the orchestrator goes away.
    pub async fn run(self) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        let mut state = IngestState::Discovering;

        loop {
            if self.tx.is_closed() {
                break;
            }

            state = match state {
                IngestState::Discovering => self.discover().await,
                IngestState::Connecting { streams } => self.connect(&streams, &mut policy).await,
                IngestState::Reading { mut connection } => {
                    match self.read_trades(connection.as_mut()).await {
                        ReadOutcome::Disconnected => {
                            self.state.set_feed_state(FeedConnectionState::Disconnected);
                            self.state.increment_reconnect_attempts();
                            metrics::record_reconnect();
                            IngestState::Discovering
                        }
                        ReadOutcome::DownstreamClosed => break,
                    }
                }
            };
        }

        tracing::info!("Live ingestion stopped, downstream receiver closed");
    }

    async fn discover(&self) -> IngestState {
        self.state.set_feed_state(FeedConnectionState::Discovering);

        match self.discovery.list_tradable_symbols().await {
            Ok(symbols) if !symbols.is_empty() => {
                tracing::info!(count = symbols.len(), "Discovered tradable symbols");
                self.state.set_symbol_count(symbols.len());
                IngestState::Connecting {
                    streams: agg_trade_streams(&symbols),
                }
            }
            Ok(_) => {
                tracing::warn!(
                    retry_ms = self.config.discovery_retry.as_millis(),
                    "No tradable symbols discovered, retrying"
                );
                tokio::time::sleep(self.config.discovery_retry).await;
                IngestState::Discovering
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    retry_ms = self.config.discovery_retry.as_millis(),
                    "Symbol discovery failed, retrying"
                );
                tokio::time::sleep(self.config.discovery_retry).await;
                IngestState::Discovering
            }
        }
    }

    async fn connect(&self, streams: &[String], policy: &mut ReconnectPolicy) -> IngestState {
        self.state.set_feed_state(FeedConnectionState::Connecting);

        match self.feed.connect(streams).await {
            Ok(connection) => {
                policy.reset();
                self.state.set_feed_state(FeedConnectionState::Connected);
                tracing::info!(streams = streams.len(), "Connected to trade feed");
                IngestState::Reading { connection }
            }
            Err(e) => {
                let delay = policy.next_delay();
                tracing::warn!(
                    error = %e,
                    attempt = policy.attempt_count(),
                    delay_ms = delay.as_millis(),
                    "Feed connection failed, rediscovering after backoff"
                );
                self.state.increment_reconnect_attempts();
                metrics::record_reconnect();
                tokio::time::sleep(delay).await;
                IngestState::Discovering
            }
        }
    }

    async fn read_trades(&self, connection: &mut dyn FeedConnection) -> ReadOutcome {
        loop {
            let payload = match connection.read_next().await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "Feed read failed, rediscovering symbols");
                    return ReadOutcome::Disconnected;
                }
            };

            self.state.increment_messages();
            metrics::record_message_received();

            if let Some(cache) = &self.cache {
                cache.append(&payload).await;
            }

            let trade = match self.decoder.decode(&payload) {
                Ok(trade) => trade,
                Err(e) => {
                    self.state.increment_decode_errors();
                    metrics::record_decode_error();
                    tracing::warn!(error = %e, bytes = payload.len(), "Failed to decode feed message");
                    continue;
                }
            };

            if self.tx.send(trade).await.is_err() {
                return ReadOutcome::DownstreamClosed;
            }
        }
    }
}
