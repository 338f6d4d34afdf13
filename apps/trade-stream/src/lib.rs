#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Trade Stream - Binance Aggregated Trade Fan-out
//!
//! Ingests the Binance `aggTrade` feed for every tradable symbol, keeps a
//! rolling cache of raw messages and fans decoded trades out to in-process
//! subscribers. On startup the cached history is replayed first; live trades
//! that arrive meanwhile are held back and released in arrival order once
//! replay completes.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core trade types and ordering rules
//!   - `trade`: Aggregated trades and raw cache entries
//!   - `sequencing`: Replay-then-live publish ordering
//!   - `retention`: Cache retention window
//!   - `streaming`: Feed connection and replay state
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for discovery, feed, decoder and cache store
//!   - `services`: Replay, live ingestion and stream orchestration
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: REST discovery, combined stream client, decoder
//!   - `cache`: Redis and in-memory cache stores
//!   - `broadcast`: Subscriber registry and fan-out
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!                    ┌──────────────┐
//! Redis cache ──────►│ Replay task  │──┐
//!                    └──────────────┘  │   ┌─────────────┐     ┌────────────┐
//!                                      ├──►│ TradeStream │────►│ Subscriber │──► Subscriber 1
//!                    ┌──────────────┐  │   │  (ordering) │     │  registry  │──► Subscriber N
//! Binance WS ───────►│ Ingest task  │──┘   └─────────────┘     └────────────┘
//!                    └──────┬───────┘
//!                           └──► Redis cache (append raw, prune on publish)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core trade types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::retention::{DEFAULT_RETENTION, RetentionPolicy};
pub use domain::sequencing::{LiveDisposition, PublishSequencer, ReplayDisposition};
pub use domain::streaming::{FeedConnectionState, ReplayPhase, StreamState};
pub use domain::trade::{AggTrade, CacheEntry, TradeTally};

// Ports
pub use application::ports::{
    CacheError, CacheStorePort, DecodeError, DiscoveryError, FeedClientPort, FeedConnection,
    FeedError, SymbolDiscoveryPort, TradeDecoder,
};

// Services
pub use application::services::{
    ReplayCache, StreamPorts, TradeStream, TradeStreamConfig,
};

// Subscriber registry
pub use infrastructure::broadcast::{
    FanoutMode, PublishStats, SubscriberId, SubscriberRegistry, Subscription,
};

// Infrastructure config
pub use infrastructure::config::{
    BinanceSettings, CacheBackend, CacheSettings, ConfigError, IngestSettings, ServerSettings,
    ServiceConfig,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
