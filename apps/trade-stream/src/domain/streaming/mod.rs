//! Stream State Tracking
//!
//! Shared, lock-light view of the live feed connection, the replay phase and
//! message counters. Written by the ingestion and orchestration tasks, read by
//! the health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Live feed connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedConnectionState {
    /// Looking up the tradable symbol set.
    Discovering,
    /// Opening the feed connection.
    Connecting,
    /// Reading from the feed.
    Connected,
    /// Connection lost; about to rediscover.
    Disconnected,
}

impl FeedConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Replay phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPhase {
    /// No cache available; replay skipped.
    Disabled,
    /// Cached trades are being replayed.
    Replaying,
    /// Replay finished.
    Complete,
}

/// Tracks the state of the trade stream.
#[derive(Debug)]
pub struct StreamState {
    feed: RwLock<FeedConnectionState>,
    replay: RwLock<ReplayPhase>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    symbol_count: AtomicU64,
    reconnect_attempts: AtomicU64,
    messages_received: AtomicU64,
    decode_errors: AtomicU64,
    trades_published: AtomicU64,
    trades_replayed: AtomicU64,
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamState {
    /// Create a new state tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            feed: RwLock::new(FeedConnectionState::Discovering),
            replay: RwLock::new(ReplayPhase::Disabled),
            last_connected_at: RwLock::new(None),
            symbol_count: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            trades_published: AtomicU64::new(0),
            trades_replayed: AtomicU64::new(0),
        }
    }

    /// Set the feed connection state.
    pub fn set_feed_state(&self, state: FeedConnectionState) {
        *self.feed.write() = state;
        if state == FeedConnectionState::Connected {
            *self.last_connected_at.write() = Some(Utc::now());
        }
    }

    /// Set the replay phase.
    pub fn set_replay_phase(&self, phase: ReplayPhase) {
        *self.replay.write() = phase;
    }

    /// Record the size of the most recently discovered symbol set.
    pub fn set_symbol_count(&self, count: usize) {
        self.symbol_count
            .store(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Increment reconnect attempts.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment raw messages received.
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment decode failures.
    pub fn increment_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a publish; `replayed` marks trades that came from the cache.
    pub fn record_published(&self, replayed: bool) {
        self.trades_published.fetch_add(1, Ordering::Relaxed);
        if replayed {
            self.trades_replayed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current feed connection state.
    #[must_use]
    pub fn feed_state(&self) -> FeedConnectionState {
        *self.feed.read()
    }

    /// Current replay phase.
    #[must_use]
    pub fn replay_phase(&self) -> ReplayPhase {
        *self.replay.read()
    }

    /// Last time the feed connected.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Size of the last discovered symbol set.
    #[must_use]
    pub fn symbol_count(&self) -> u64 {
        self.symbol_count.load(Ordering::Relaxed)
    }

    /// Reconnect attempts since startup.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Raw messages received since startup.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Decode failures since startup.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Trades published since startup.
    #[must_use]
    pub fn trades_published(&self) -> u64 {
        self.trades_published.load(Ordering::Relaxed)
    }

    /// Trades published from the replay cache.
    #[must_use]
    pub fn trades_replayed(&self) -> u64 {
        self.trades_replayed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let state = StreamState::new();
        assert_eq!(state.feed_state(), FeedConnectionState::Discovering);
        assert_eq!(state.replay_phase(), ReplayPhase::Disabled);
        assert!(state.last_connected_at().is_none());
        assert_eq!(state.trades_published(), 0);
    }

    #[test]
    fn connecting_sets_last_connected() {
        let state = StreamState::new();
        state.set_feed_state(FeedConnectionState::Connected);
        assert!(state.last_connected_at().is_some());

        state.set_feed_state(FeedConnectionState::Disconnected);
        assert_eq!(state.feed_state(), FeedConnectionState::Disconnected);
        assert!(state.last_connected_at().is_some());
    }

    #[test]
    fn published_counters() {
        let state = StreamState::new();
        state.record_published(true);
        state.record_published(true);
        state.record_published(false);
        assert_eq!(state.trades_published(), 3);
        assert_eq!(state.trades_replayed(), 2);
    }

    #[test]
    fn state_serialization() {
        assert_eq!(
            serde_json::to_string(&FeedConnectionState::Connected).unwrap(),
            "\"connected\""
        );
        assert_eq!(
            serde_json::to_string(&ReplayPhase::Replaying).unwrap(),
            "\"replaying\""
        );
        assert_eq!(FeedConnectionState::Disconnected.as_str(), "disconnected");
    }
}
