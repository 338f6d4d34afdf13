//! Trade Domain Types
//!
//! The decoded aggregated trade delivered to subscribers and the raw cache
//! record persisted for replay.
//!
//! Cache entries hold the payload exactly as received from the feed. Decoding
//! happens at replay time so that a change in the wire format never requires
//! rewriting cached history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Suffix appended to a lowercase symbol to form its aggregated-trade stream name.
pub const AGG_TRADE_STREAM_SUFFIX: &str = "@aggTrade";

// =============================================================================
// Aggregated Trade
// =============================================================================

/// A decoded aggregated trade.
///
/// Immutable once decoded. Every subscriber receives its own clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggTrade {
    /// Exchange symbol (e.g., "BTCUSDT").
    pub symbol: String,
    /// Aggregate trade ID assigned by the exchange.
    pub aggregate_id: u64,
    /// Trade price.
    pub price: Decimal,
    /// Trade quantity.
    pub quantity: Decimal,
    /// First underlying trade ID in the aggregate.
    pub first_trade_id: u64,
    /// Last underlying trade ID in the aggregate.
    pub last_trade_id: u64,
    /// Time the trade executed.
    pub trade_time: DateTime<Utc>,
    /// Time the exchange emitted the event.
    pub event_time: DateTime<Utc>,
    /// Whether the buyer was the maker.
    pub buyer_is_maker: bool,
}

impl AggTrade {
    /// Price multiplied by quantity.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Number of underlying trades folded into this aggregate.
    #[must_use]
    pub const fn trade_count(&self) -> u64 {
        self.last_trade_id.saturating_sub(self.first_trade_id) + 1
    }
}

/// Running totals over a window of published trades.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeTally {
    /// Aggregate trades seen.
    pub aggregates: u64,
    /// Underlying exchange trades folded into those aggregates.
    pub trades: u64,
    /// Summed price times quantity.
    pub notional: Decimal,
}

impl TradeTally {
    /// Add one aggregate trade.
    pub fn record(&mut self, trade: &AggTrade) {
        self.aggregates += 1;
        self.trades = self.trades.saturating_add(trade.trade_count());
        self.notional += trade.notional();
    }

    /// Return the current totals and start a new window.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Build the aggregated-trade stream name for a symbol.
#[must_use]
pub fn agg_trade_stream(symbol: &str) -> String {
    format!("{}{AGG_TRADE_STREAM_SUFFIX}", symbol.to_lowercase())
}

/// Build stream names for every symbol, preserving order.
#[must_use]
pub fn agg_trade_streams<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
    symbols
        .iter()
        .map(|symbol| agg_trade_stream(symbol.as_ref()))
        .collect()
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A raw feed message persisted in the replay cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Position assigned by the cache store. Lower is older.
    pub index: u64,
    /// Wall-clock append time in seconds since the Unix epoch.
    pub timestamp: i64,
    /// Payload bytes as received from the feed.
    pub payload: Vec<u8>,
}

impl CacheEntry {
    /// Create a new cache entry.
    #[must_use]
    pub const fn new(index: u64, timestamp: i64, payload: Vec<u8>) -> Self {
        Self {
            index,
            timestamp,
            payload,
        }
    }

    /// Entries written without a timestamp cannot be placed in time and are
    /// never replayed.
    #[must_use]
    pub const fn has_timestamp(&self) -> bool {
        self.timestamp != 0
    }
}
