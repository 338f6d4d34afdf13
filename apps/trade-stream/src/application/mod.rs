//! Application Layer - Ports and the stream services that drive them.
//!
//! The services here own all coordination: replaying the cache, ingesting
//! the live feed and merging both into one publish order.

/// Port interfaces for external systems (discovery, feed, decoder, cache).
pub mod ports;

/// Replay, ingestion and orchestration services.
pub mod services;
