//! Prometheus Metrics Module
//!
//! Exposes trade stream metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Feed**: Raw messages received, decode failures, reconnects
//! - **Publishing**: Trades published (live vs replayed), queued, dropped
//! - **Cache**: Appends, pruned entries, backend errors
//! - **State**: Subscriber count, replay in progress
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before `init_metrics` is a no-op.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Feed
    describe_counter!(
        "trade_stream_messages_received_total",
        "Raw messages received from the upstream feed"
    );
    describe_counter!(
        "trade_stream_decode_errors_total",
        "Feed messages that could not be decoded"
    );
    describe_counter!(
        "trade_stream_reconnects_total",
        "Feed reconnection attempts"
    );

    // Publishing
    describe_counter!(
        "trade_stream_trades_published_total",
        "Trades published to subscribers by source"
    );
    describe_counter!(
        "trade_stream_trades_queued_total",
        "Live trades held back until replay completed"
    );
    describe_counter!(
        "trade_stream_trades_dropped_total",
        "Per-subscriber deliveries dropped because the buffer was full"
    );

    // Cache
    describe_counter!(
        "trade_stream_cache_appends_total",
        "Raw payloads appended to the replay cache"
    );
    describe_counter!(
        "trade_stream_cache_pruned_total",
        "Expired entries removed from the replay cache"
    );
    describe_counter!(
        "trade_stream_cache_errors_total",
        "Replay cache operations that failed"
    );

    // State
    describe_gauge!(
        "trade_stream_subscribers",
        "Number of registered subscribers"
    );
    describe_gauge!(
        "trade_stream_replay_active",
        "1 while cached trades are being replayed"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

const fn source_label(replayed: bool) -> &'static str {
    if replayed { "replay" } else { "live" }
}

/// Record a raw message received from the feed.
pub fn record_message_received() {
    counter!("trade_stream_messages_received_total").increment(1);
}

/// Record a feed message that failed to decode.
pub fn record_decode_error() {
    counter!("trade_stream_decode_errors_total").increment(1);
}

/// Record a feed reconnection attempt.
pub fn record_reconnect() {
    counter!("trade_stream_reconnects_total").increment(1);
}

/// Record a trade published to subscribers.
pub fn record_trade_published(replayed: bool) {
    counter!(
        "trade_stream_trades_published_total",
        "source" => source_label(replayed)
    )
    .increment(1);
}

/// Record a live trade queued behind replay.
pub fn record_trade_queued() {
    counter!("trade_stream_trades_queued_total").increment(1);
}

/// Record deliveries dropped for full subscriber buffers.
pub fn record_trades_dropped(count: usize) {
    counter!("trade_stream_trades_dropped_total")
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Record a successful cache append.
pub fn record_cache_append() {
    counter!("trade_stream_cache_appends_total").increment(1);
}

/// Record expired cache entries removed.
pub fn record_cache_pruned(count: u64) {
    counter!("trade_stream_cache_pruned_total").increment(count);
}

/// Record a failed cache operation.
pub fn record_cache_error(operation: &'static str) {
    counter!(
        "trade_stream_cache_errors_total",
        "operation" => operation
    )
    .increment(1);
}

/// Update the subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriber_count(count: usize) {
    gauge!("trade_stream_subscribers").set(count as f64);
}

/// Mark replay as running or finished.
pub fn set_replay_active(active: bool) {
    gauge!("trade_stream_replay_active").set(if active { 1.0 } else { 0.0 });
}

// =============================================================================
// Tests
// =============================================================================
