//! Trade Stream Orchestrator
//!
//! Owns the subscriber registry and the optional replay cache, spawns the
//! replay and live ingestion tasks and merges their output into a single
//! publish order: every cached trade first, then live trades in arrival
//! order.
//!
//! # Data Flow
//!
//! ```text
//! Cache ──► CacheReplayTask ──┐
//!                             ├──► TradeStream::start ──► SubscriberRegistry ──► subscribers
//! Feed  ──► LiveIngestTask ───┘          │
//!              │                         └──► prune cache after each live publish
//!              └──► append raw payload to cache
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use super::cache::ReplayCache;
use super::ingest::{IngestConfig, LiveIngestTask};
use super::replay::{CacheReplayTask, ReplayMessage};
use crate::application::ports::{CacheStorePort, FeedClientPort, SymbolDiscoveryPort, TradeDecoder};
use crate::domain::retention::RetentionPolicy;
use crate::domain::sequencing::{LiveDisposition, PublishSequencer, ReplayDisposition};
use crate::domain::streaming::{ReplayPhase, StreamState};
use crate::domain::trade::AggTrade;
use crate::infrastructure::broadcast::{FanoutMode, SubscriberId, SubscriberRegistry, Subscription};
use crate::infrastructure::metrics;

/// Default capacity of the replay and live handoff channels.
pub const DEFAULT_HANDOFF_CAPACITY: usize = 1;

/// External collaborators of the trade stream.
#[derive(Clone)]
pub struct StreamPorts {
    /// Tradable symbol discovery.
    pub discovery: Arc<dyn SymbolDiscoveryPort>,
    /// Upstream feed client.
    pub feed: Arc<dyn FeedClientPort>,
    /// Payload decoder, shared by replay and live ingestion.
    pub decoder: Arc<dyn TradeDecoder>,
}

/// Trade stream configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeStreamConfig {
    /// Cache retention window.
    pub retention: RetentionPolicy,
    /// Subscriber delivery mode.
    pub fanout: FanoutMode,
    /// Capacity of the replay and live handoff channels.
    pub handoff_capacity: usize,
    /// Live ingestion timing.
    pub ingest: IngestConfig,
}

impl Default for TradeStreamConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            fanout: FanoutMode::default(),
            handoff_capacity: DEFAULT_HANDOFF_CAPACITY,
            ingest: IngestConfig::default(),
        }
    }
}

/// Replay-then-live trade stream.
pub struct TradeStream {
    ports: StreamPorts,
    cache: Option<ReplayCache>,
    registry: Arc<SubscriberRegistry>,
    state: Arc<StreamState>,
    config: TradeStreamConfig,
}

impl std::fmt::Debug for TradeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeStream")
            .field("cache", &self.cache)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TradeStream {
    /// Create a trade stream.
    ///
    /// The cache store, if any, is probed once here. A store that fails the
    /// probe is ignored for the life of this stream and trades flow live-only.
    pub async fn new(
        ports: StreamPorts,
        store: Option<Arc<dyn CacheStorePort>>,
        config: TradeStreamConfig,
    ) -> Self {
        let cache = match store {
            Some(store) => ReplayCache::connect(store, config.retention).await,
            None => {
                tracing::info!("No cache store configured, running live-only");
                None
            }
        };

        let state = Arc::new(StreamState::new());
        state.set_replay_phase(if cache.is_some() {
            ReplayPhase::Replaying
        } else {
            ReplayPhase::Disabled
        });

        Self {
            ports,
            cache,
            registry: Arc::new(SubscriberRegistry::new(config.fanout)),
            state,
            config,
        }
    }

    /// Whether the replay cache is in use.
    #[must_use]
    pub const fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Shared stream state.
    #[must_use]
    pub fn state(&self) -> Arc<StreamState> {
        Arc::clone(&self.state)
    }

    /// Subscriber registry.
    #[must_use]
    pub fn registry(&self) -> Arc<SubscriberRegistry> {
        Arc::clone(&self.registry)
    }

    /// Register a new subscriber.
    pub async fn subscribe(&self) -> Subscription {
        self.registry.subscribe().await
    }

    /// Remove a subscriber. No-op if already removed.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.unsubscribe(id).await
    }

    /// Spawn replay and live ingestion, then publish their merged output.
    ///
    /// Runs until live ingestion stops, which does not happen in normal
    /// operation.
    pub async fn start(&self) {
        let capacity = self.config.handoff_capacity.max(1);
        let (live_tx, mut live_rx) = mpsc::channel(capacity);

        // The replay bound is captured before live ingestion can append.
        let (mut replay_rx, mut sequencer) = match &self.cache {
            Some(cache) => {
                let count = cache.len().await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Failed to read cache length, skipping replay");
                    0
                });
                let (replay_tx, replay_rx) = mpsc::channel(capacity);
                self.state.set_replay_phase(ReplayPhase::Replaying);
                metrics::set_replay_active(true);
                tokio::spawn(
                    CacheReplayTask::new(cache.clone(), Arc::clone(&self.ports.decoder), count, replay_tx)
                        .run(),
                );
                (Some(replay_rx), PublishSequencer::awaiting_replay())
            }
            None => (None, PublishSequencer::live_only()),
        };

        tokio::spawn(
            LiveIngestTask::new(
                Arc::clone(&self.ports.discovery),
                Arc::clone(&self.ports.feed),
                Arc::clone(&self.ports.decoder),
                self.cache.clone(),
                live_tx,
                self.config.ingest.clone(),
                Arc::clone(&self.state),
            )
            .run(),
        );

        tracing::info!(
            cache_enabled = self.cache.is_some(),
            fanout = self.config.fanout.as_str(),
            "Trade stream started"
        );

        loop {
            tokio::select! {
                biased;

                message = recv_replay(&mut replay_rx) => match message {
                    Some(ReplayMessage::Trade(trade)) => {
                        if sequencer.on_replayed() == ReplayDisposition::Late {
                            tracing::warn!(
                                symbol = %trade.symbol,
                                aggregate_id = trade.aggregate_id,
                                "Replayed trade arrived after replay completed"
                            );
                        }
                        self.publish(&trade, true).await;
                    }
                    Some(ReplayMessage::Complete(summary)) => {
                        tracing::debug!(restored = summary.restored, "Replay terminator received");
                        self.complete_replay(&mut sequencer);
                        replay_rx = None;
                    }
                    None => {
                        tracing::warn!("Replay channel closed without completion");
                        self.complete_replay(&mut sequencer);
                        replay_rx = None;
                    }
                },

                trade = live_rx.recv() => {
                    let Some(trade) = trade else {
                        tracing::warn!("Live ingestion stopped");
                        break;
                    };
                    self.on_live(&mut sequencer, trade).await;
                }
            }
        }
    }

    async fn on_live(&self, sequencer: &mut PublishSequencer<AggTrade>, trade: AggTrade) {
        match sequencer.on_live(trade) {
            LiveDisposition::Queued { pending } => {
                metrics::record_trade_queued();
                tracing::trace!(pending, "Queued live trade until replay completes");
            }
            LiveDisposition::Release { flushed, current } => {
                if !flushed.is_empty() {
                    tracing::info!(count = flushed.len(), "Publishing live trades queued during replay");
                }
                for queued in &flushed {
                    self.publish(queued, false).await;
                }
                self.publish(&current, false).await;

                if let Some(cache) = &self.cache {
                    cache.prune().await;
                }
            }
        }
    }

    fn complete_replay(&self, sequencer: &mut PublishSequencer<AggTrade>) {
        if sequencer.on_replay_complete() {
            self.state.set_replay_phase(ReplayPhase::Complete);
            metrics::set_replay_active(false);
            tracing::info!(queued = sequencer.pending_len(), "Replay complete, switching to live");
        }
    }

    async fn publish(&self, trade: &AggTrade, replayed: bool) {
        let stats = self.registry.publish(trade).await;
        self.state.record_published(replayed);
        metrics::record_trade_published(replayed);
        if stats.dropped > 0 {
            metrics::record_trades_dropped(stats.dropped);
        }
    }
}

/// Receive from the replay channel, or wait forever once it is gone.
async fn recv_replay(rx: &mut Option<mpsc::Receiver<ReplayMessage>>) -> Option<ReplayMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
