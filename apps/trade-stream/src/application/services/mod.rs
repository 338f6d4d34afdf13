//! Application Services
//!
//! - `ReplayCache`: availability probe, best-effort appends and pruning
//! - `CacheReplayTask`: one-shot replay of cached trades at startup
//! - `LiveIngestTask`: discovery, connection and decoding of the live feed
//! - `TradeStream`: merges both sources and publishes to subscribers

mod cache;
mod ingest;
mod replay;
mod stream;

pub use cache::ReplayCache;
pub use ingest::{DEFAULT_DISCOVERY_RETRY, IngestConfig, LiveIngestTask};
pub use replay::{CacheReplayTask, ReplayMessage, ReplaySummary};
pub use stream::{DEFAULT_HANDOFF_CAPACITY, StreamPorts, TradeStream, TradeStreamConfig};
