//! Port Interfaces
//!
//! Contracts for the external collaborators the trade stream depends on.
//! Infrastructure adapters implement these; tests substitute fakes.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SymbolDiscoveryPort`: lists currently tradable symbols
//! - `FeedClientPort` / `FeedConnection`: upstream trade feed connection
//! - `TradeDecoder`: raw feed payload to `AggTrade`
//! - `CacheStorePort`: ordered append log backing the replay cache

use async_trait::async_trait;

use crate::domain::trade::{AggTrade, CacheEntry};

// =============================================================================
// Errors
// =============================================================================

/// Symbol discovery error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    /// Request to the discovery endpoint failed.
    #[error("symbol discovery request failed: {message}")]
    RequestFailed {
        /// Error details.
        message: String,
    },

    /// Endpoint returned a response that could not be interpreted.
    #[error("invalid symbol discovery response: {message}")]
    InvalidResponse {
        /// Error details.
        message: String,
    },
}

/// Feed connection error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    /// Connection could not be established.
    #[error("feed connection failed: {message}")]
    ConnectionFailed {
        /// Error details.
        message: String,
    },

    /// Reading from an established connection failed.
    #[error("feed read failed: {message}")]
    ReadFailed {
        /// Error details.
        message: String,
    },

    /// Upstream closed the connection.
    #[error("feed connection closed")]
    ConnectionClosed,
}

/// Trade decode error.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not valid JSON or does not match the trade schema.
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is a different event type.
    #[error("unexpected event type: {0}")]
    UnexpectedEvent(String),

    /// A field has a value that cannot be represented.
    #[error("invalid field {field}: {message}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Error details.
        message: String,
    },
}

/// Cache store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Store could not be reached.
    #[error("cache unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Store holds no entries.
    #[error("cache is empty")]
    Empty,

    /// A stored record could not be read back.
    #[error("corrupt cache entry at {index}: {message}")]
    CorruptEntry {
        /// Entry position.
        index: u64,
        /// Error details.
        message: String,
    },

    /// Store command failed.
    #[error("cache backend error: {message}")]
    Backend {
        /// Error details.
        message: String,
    },
}

// =============================================================================
// Ports
// =============================================================================

/// Port for discovering the tradable symbol set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SymbolDiscoveryPort: Send + Sync {
    /// List every symbol currently open for trading.
    async fn list_tradable_symbols(&self) -> Result<Vec<String>, DiscoveryError>;
}

/// Port for opening upstream feed connections.
#[async_trait]
pub trait FeedClientPort: Send + Sync {
    /// Open a connection subscribed to the given stream names.
    async fn connect(&self, streams: &[String]) -> Result<Box<dyn FeedConnection>, FeedError>;
}

/// An open upstream feed connection.
#[async_trait]
pub trait FeedConnection: Send {
    /// Read the next raw message payload.
    async fn read_next(&mut self) -> Result<Vec<u8>, FeedError>;
}

/// Decodes raw feed payloads into trades.
pub trait TradeDecoder: Send + Sync {
    /// Decode one payload.
    fn decode(&self, payload: &[u8]) -> Result<AggTrade, DecodeError>;
}

/// Port for the ordered append log backing the replay cache.
///
/// Entries are ordered by position; position 0 is the oldest.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStorePort: Send + Sync {
    /// Probe availability.
    async fn ping(&self) -> Result<(), CacheError>;

    /// Number of entries currently stored.
    async fn len(&self) -> Result<u64, CacheError>;

    /// Entry at `position`, or `None` past the end.
    async fn get_n(&self, position: u64) -> Result<Option<CacheEntry>, CacheError>;

    /// Oldest entry. Fails with `CacheError::Empty` when there is none.
    async fn get_first(&self) -> Result<CacheEntry, CacheError>;

    /// Remove the oldest entry.
    async fn remove_first(&self) -> Result<(), CacheError>;

    /// Append a payload stamped with the current time.
    async fn append(&self, payload: &[u8]) -> Result<(), CacheError>;
}
