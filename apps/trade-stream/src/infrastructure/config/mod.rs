//! Configuration Module
//!
//! Environment-driven configuration for the trade stream service.

mod settings;

pub use settings::{
    BinanceSettings, CacheBackend, CacheSettings, ConfigError, DEFAULT_CACHE_KEY, IngestSettings,
    ServerSettings, ServiceConfig,
};
