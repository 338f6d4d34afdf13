//! Service Configuration Settings
//!
//! Configuration types for the trade stream, loaded from environment variables.

use std::time::Duration;

use crate::application::services::{DEFAULT_HANDOFF_CAPACITY, IngestConfig, TradeStreamConfig};
use crate::domain::retention::{DEFAULT_RETENTION, RetentionPolicy};
use crate::infrastructure::broadcast::{DEFAULT_SUBSCRIBER_BUFFER, FanoutMode};
use crate::infrastructure::reconnect::ReconnectConfig;

/// Default Redis list key holding cached trades.
pub const DEFAULT_CACHE_KEY: &str = "binance.trades";

/// Where cached trades are stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// Redis list at the given URL.
    Redis {
        /// Connection URL (e.g., `redis://localhost:6379`).
        url: String,
    },
    /// Process-local store. Contents are lost on restart.
    Memory,
    /// No cache; live-only.
    #[default]
    Disabled,
}

impl CacheBackend {
    /// Backend name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Redis { .. } => "redis",
            Self::Memory => "memory",
            Self::Disabled => "disabled",
        }
    }
}

/// Replay cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Storage backend.
    pub backend: CacheBackend,
    /// Key under which entries are stored.
    pub key: String,
    /// Retention window.
    pub retention: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            key: DEFAULT_CACHE_KEY.to_string(),
            retention: DEFAULT_RETENTION,
        }
    }
}

/// Binance endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinanceSettings {
    /// REST API base URL.
    pub rest_url: String,
    /// WebSocket stream base URL.
    pub stream_url: String,
    /// Only stream symbols quoted in this asset (e.g., "USDT").
    pub quote_asset: Option<String>,
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            rest_url: "https://api.binance.com".to_string(),
            stream_url: "wss://stream.binance.com:9443".to_string(),
            quote_asset: None,
        }
    }
}

/// Live ingestion settings.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    /// Wait after a failed or empty discovery.
    pub discovery_retry: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier (1.0 = fixed delay).
    pub reconnect_delay_multiplier: f64,
    /// Reconnection jitter fraction.
    pub reconnect_jitter: f64,
    /// Capacity of the replay and live handoff channels.
    pub handoff_capacity: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            discovery_retry: Duration::from_secs(1),
            reconnect_delay_initial: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(1),
            reconnect_delay_multiplier: 1.0,
            reconnect_jitter: 0.0,
            handoff_capacity: DEFAULT_HANDOFF_CAPACITY,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceConfig {
    /// Replay cache settings.
    pub cache: CacheSettings,
    /// Binance endpoints.
    pub binance: BinanceSettings,
    /// Live ingestion settings.
    pub ingest: IngestSettings,
    /// Subscriber delivery mode.
    pub fanout: FanoutMode,
    /// Server port settings.
    pub server: ServerSettings,
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid enumeration value or a
    /// capacity of zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let redis_url = env.non_empty("REDIS_URL");
        let backend = match env.non_empty("TRADE_STREAM_CACHE_BACKEND") {
            None => redis_url.map_or(CacheBackend::Disabled, |url| CacheBackend::Redis { url }),
            Some(name) => match name.to_lowercase().as_str() {
                "redis" => CacheBackend::Redis {
                    url: redis_url.ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL".to_string()))?,
                },
                "memory" => CacheBackend::Memory,
                "none" | "disabled" => CacheBackend::Disabled,
                _ => return Err(ConfigError::invalid("TRADE_STREAM_CACHE_BACKEND", name)),
            },
        };

        let cache = CacheSettings {
            backend,
            key: env
                .non_empty("TRADE_STREAM_CACHE_KEY")
                .unwrap_or_else(|| DEFAULT_CACHE_KEY.to_string()),
            retention: env.duration_secs("TRADE_STREAM_RETENTION_SECS", DEFAULT_RETENTION),
        };

        let binance_defaults = BinanceSettings::default();
        let binance = BinanceSettings {
            rest_url: env
                .non_empty("BINANCE_REST_URL")
                .unwrap_or(binance_defaults.rest_url),
            stream_url: env
                .non_empty("BINANCE_STREAM_URL")
                .unwrap_or(binance_defaults.stream_url),
            quote_asset: env
                .non_empty("TRADE_STREAM_QUOTE_ASSET")
                .map(|asset| asset.to_uppercase()),
        };

        let ingest_defaults = IngestSettings::default();
        let ingest = IngestSettings {
            discovery_retry: env.duration_millis(
                "TRADE_STREAM_DISCOVERY_RETRY_MS",
                ingest_defaults.discovery_retry,
            ),
            reconnect_delay_initial: env.duration_millis(
                "TRADE_STREAM_RECONNECT_DELAY_INITIAL_MS",
                ingest_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.duration_secs(
                "TRADE_STREAM_RECONNECT_DELAY_MAX_SECS",
                ingest_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parse(
                "TRADE_STREAM_RECONNECT_DELAY_MULTIPLIER",
                ingest_defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: env.parse(
                "TRADE_STREAM_RECONNECT_JITTER",
                ingest_defaults.reconnect_jitter,
            ),
            handoff_capacity: env.capacity(
                "TRADE_STREAM_HANDOFF_CAPACITY",
                ingest_defaults.handoff_capacity,
            )?,
        };

        let buffer = env.capacity("TRADE_STREAM_SUBSCRIBER_BUFFER", DEFAULT_SUBSCRIBER_BUFFER)?;
        let fanout = match env.non_empty("TRADE_STREAM_FANOUT_MODE") {
            None => FanoutMode::Blocking,
            Some(mode) => match mode.to_lowercase().as_str() {
                "blocking" => FanoutMode::Blocking,
                "drop" | "drop_on_full" => FanoutMode::DropOnFull { capacity: buffer },
                _ => return Err(ConfigError::invalid("TRADE_STREAM_FANOUT_MODE", mode)),
            },
        };

        let server = ServerSettings {
            health_port: env.parse("TRADE_STREAM_HEALTH_PORT", ServerSettings::default().health_port),
        };

        Ok(Self {
            cache,
            binance,
            ingest,
            fanout,
            server,
        })
    }

    /// Orchestrator configuration derived from these settings.
    #[must_use]
    pub fn trade_stream_config(&self) -> TradeStreamConfig {
        TradeStreamConfig {
            retention: RetentionPolicy::new(self.cache.retention),
            fanout: self.fanout,
            handoff_capacity: self.ingest.handoff_capacity,
            ingest: IngestConfig {
                discovery_retry: self.ingest.discovery_retry,
                reconnect: ReconnectConfig::from_ingest_settings(&self.ingest),
            },
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable holds a value outside the accepted set.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// Capacity must be at least one.
    #[error("environment variable {0} must be greater than zero")]
    ZeroCapacity(String),
}

impl ConfigError {
    fn invalid(key: &str, value: String) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value,
        }
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn non_empty(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.non_empty(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.non_empty(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.non_empty(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }

    fn capacity(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        match self.parse(key, default) {
            0 => Err(ConfigError::ZeroCapacity(key.to_string())),
            capacity => Ok(capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.cache.backend, CacheBackend::Disabled);
        assert_eq!(config.cache.key, "binance.trades");
        assert_eq!(config.cache.retention, Duration::from_secs(7200));
        assert_eq!(config.binance.rest_url, "https://api.binance.com");
        assert_eq!(config.binance.stream_url, "wss://stream.binance.com:9443");
        assert_eq!(config.fanout, FanoutMode::Blocking);
        assert_eq!(config.ingest.handoff_capacity, 1);
        assert_eq!(config.server.health_port, 8083);
    }

    #[test]
    fn redis_url_enables_cache() {
        let config = config_from(&[("REDIS_URL", "redis://cache:6379")]).unwrap();
        assert_eq!(
            config.cache.backend,
            CacheBackend::Redis {
                url: "redis://cache:6379".to_string()
            }
        );
    }

    #[test]
    fn blank_redis_url_disables_cache() {
        let config = config_from(&[("REDIS_URL", "  ")]).unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Disabled);
    }

    #[test_case("memory", CacheBackend::Memory ; "memory")]
    #[test_case("NONE", CacheBackend::Disabled ; "none uppercase")]
    #[test_case("disabled", CacheBackend::Disabled ; "disabled")]
    fn explicit_cache_backend(name: &str, expected: CacheBackend) {
        let config = config_from(&[
            ("TRADE_STREAM_CACHE_BACKEND", name),
            ("REDIS_URL", "redis://ignored"),
        ])
        .unwrap();
        assert_eq!(config.cache.backend, expected);
    }

    #[test]
    fn redis_backend_requires_url() {
        let err = config_from(&[("TRADE_STREAM_CACHE_BACKEND", "redis")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "REDIS_URL"));
    }

    #[test_case(&[("TRADE_STREAM_FANOUT_MODE", "blocking")], FanoutMode::Blocking ; "blocking")]
    #[test_case(&[("TRADE_STREAM_FANOUT_MODE", "drop")], FanoutMode::DropOnFull { capacity: 1024 } ; "drop default buffer")]
    #[test_case(
        &[("TRADE_STREAM_FANOUT_MODE", "DROP"), ("TRADE_STREAM_SUBSCRIBER_BUFFER", "16")],
        FanoutMode::DropOnFull { capacity: 16 } ;
        "drop custom buffer"
    )]
    fn fanout_mode(vars: &[(&str, &str)], expected: FanoutMode) {
        assert_eq!(config_from(vars).unwrap().fanout, expected);
    }

    #[test]
    fn unknown_fanout_mode_is_rejected() {
        let err = config_from(&[("TRADE_STREAM_FANOUT_MODE", "lossy")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { value, .. } if value == "lossy"));
    }

    #[test_case("TRADE_STREAM_HANDOFF_CAPACITY" ; "handoff")]
    #[test_case("TRADE_STREAM_SUBSCRIBER_BUFFER" ; "subscriber buffer")]
    fn zero_capacity_is_rejected(key: &str) {
        let err = config_from(&[(key, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity(k) if k == key));
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("TRADE_STREAM_RETENTION_SECS", "two hours"),
            ("TRADE_STREAM_HEALTH_PORT", "http"),
        ])
        .unwrap();
        assert_eq!(config.cache.retention, DEFAULT_RETENTION);
        assert_eq!(config.server.health_port, 8083);
    }

    #[test]
    fn quote_asset_is_uppercased() {
        let config = config_from(&[("TRADE_STREAM_QUOTE_ASSET", "usdt")]).unwrap();
        assert_eq!(config.binance.quote_asset.as_deref(), Some("USDT"));
    }

    #[test]
    fn trade_stream_config_carries_settings() {
        let config = config_from(&[
            ("TRADE_STREAM_RETENTION_SECS", "60"),
            ("TRADE_STREAM_DISCOVERY_RETRY_MS", "250"),
            ("TRADE_STREAM_RECONNECT_DELAY_INITIAL_MS", "500"),
            ("TRADE_STREAM_RECONNECT_DELAY_MAX_SECS", "8"),
            ("TRADE_STREAM_RECONNECT_DELAY_MULTIPLIER", "2.0"),
            ("TRADE_STREAM_HANDOFF_CAPACITY", "4"),
        ])
        .unwrap();

        let stream = config.trade_stream_config();
        assert_eq!(stream.retention.window(), Duration::from_secs(60));
        assert_eq!(stream.handoff_capacity, 4);
        assert_eq!(stream.ingest.discovery_retry, Duration::from_millis(250));
        assert_eq!(stream.ingest.reconnect.initial_delay, Duration::from_millis(500));
        assert_eq!(stream.ingest.reconnect.max_delay, Duration::from_secs(8));
        assert!((stream.ingest.reconnect.multiplier - 2.0).abs() < f64::EPSILON);
    }
}
