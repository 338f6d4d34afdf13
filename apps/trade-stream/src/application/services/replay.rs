//! Cache Replay Task
//!
//! Streams cached trades, oldest first, to the orchestrator on startup and
//! then signals completion exactly once.
//!
//! The number of entries to replay is captured by the caller before live
//! ingestion starts, so trades appended while replay is running are never
//! read back by this pass.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::cache::ReplayCache;
use crate::application::ports::TradeDecoder;
use crate::domain::trade::AggTrade;

/// Messages sent from the replay task to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayMessage {
    /// A cached trade, in cache order.
    Trade(AggTrade),
    /// No more cached trades. Sent once.
    Complete(ReplaySummary),
}

/// Outcome of a replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Entries present when replay started.
    pub requested: u64,
    /// Entries read from the store.
    pub read: u64,
    /// Trades forwarded to the orchestrator.
    pub restored: u64,
    /// Entries skipped (missing timestamp or undecodable).
    pub skipped: u64,
    /// Trade time of the first restored trade.
    pub first_trade_time: Option<DateTime<Utc>>,
    /// Trade time of the last restored trade.
    pub last_trade_time: Option<DateTime<Utc>>,
}

impl ReplaySummary {
    /// Time covered by the restored trades.
    #[must_use]
    pub fn time_range(&self) -> Option<chrono::Duration> {
        Some(self.last_trade_time? - self.first_trade_time?)
    }

    fn record_trade(&mut self, trade: &AggTrade) {
        if self.first_trade_time.is_none() {
            self.first_trade_time = Some(trade.trade_time);
        }
        self.last_trade_time = Some(trade.trade_time);
        self.restored += 1;
    }
}

/// One-shot task replaying the cache.
pub struct CacheReplayTask {
    cache: ReplayCache,
    decoder: Arc<dyn TradeDecoder>,
    count: u64,
    tx: mpsc::Sender<ReplayMessage>,
}

impl CacheReplayTask {
    /// Create a task that replays at most `count` entries.
    #[must_use]
    pub fn new(
        cache: ReplayCache,
        decoder: Arc<dyn TradeDecoder>,
        count: u64,
        tx: mpsc::Sender<ReplayMessage>,
    ) -> Self {
        Self {
            cache,
            decoder,
            count,
            tx,
        }
    }

    /// Replay the cache, then send `ReplayMessage::Complete`.
    pub async fn run(self) -> ReplaySummary {
        let started = Instant::now();
        let mut summary = ReplaySummary {
            requested: self.count,
            ..ReplaySummary::default()
        };

        tracing::info!(count = self.count, "Restoring trades from cache");

        for position in 0..self.count {
            let entry = match self.cache.get_n(position).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    tracing::warn!(
                        read = summary.read,
                        requested = self.count,
                        "Cache returned fewer entries than expected"
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, position, "Cache read failed, ending replay early");
                    break;
                }
            };
            summary.read += 1;

            if !entry.has_timestamp() {
                summary.skipped += 1;
                tracing::warn!(index = entry.index, "Skipping cache entry with zero timestamp");
                continue;
            }

            let trade = match self.decoder.decode(&entry.payload) {
                Ok(trade) => trade,
                Err(e) => {
                    summary.skipped += 1;
                    tracing::warn!(error = %e, index = entry.index, "Failed to decode cached trade");
                    continue;
                }
            };

            summary.record_trade(&trade);
            if self.tx.send(ReplayMessage::Trade(trade)).await.is_err() {
                tracing::warn!("Replay receiver dropped, abandoning replay");
                return summary;
            }
        }

        tracing::info!(
            restored = summary.restored,
            skipped = summary.skipped,
            duration_ms = started.elapsed().as_millis(),
            range_secs = summary.time_range().map(|range| range.num_seconds()),
            "Cache replay complete"
        );

        let _ = self.tx.send(ReplayMessage::Complete(summary.clone())).await;
        summary
    }
}
