//! Redis Cache Store
//!
//! Stores raw feed payloads in a Redis list, oldest at the head:
//!
//! | Operation      | Command             |
//! |----------------|---------------------|
//! | `ping`         | `PING`              |
//! | `len`          | `LLEN key`          |
//! | `get_n(i)`     | `LINDEX key i`      |
//! | `get_first`    | `LINDEX key 0`      |
//! | `remove_first` | `LPOP key`          |
//! | `append`       | `RPUSH key record`  |
//!
//! Each list element is a JSON record `{"timestamp": <unix secs>, "message": <payload>}`.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use crate::application::ports::{CacheError, CacheStorePort};
use crate::domain::trade::CacheEntry;

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() {
            Self::Unavailable {
                message: e.to_string(),
            }
        } else {
            Self::Backend {
                message: e.to_string(),
            }
        }
    }
}

/// Wire format of a list element.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    timestamp: i64,
    message: String,
}

impl StoredEntry {
    fn encode(timestamp: i64, payload: &[u8]) -> Result<String, CacheError> {
        let entry = Self {
            timestamp,
            message: String::from_utf8_lossy(payload).into_owned(),
        };
        serde_json::to_string(&entry).map_err(|e| CacheError::Backend {
            message: e.to_string(),
        })
    }

    fn decode(index: u64, raw: &str) -> Result<CacheEntry, CacheError> {
        let entry: Self = serde_json::from_str(raw).map_err(|e| CacheError::CorruptEntry {
            index,
            message: e.to_string(),
        })?;
        Ok(CacheEntry::new(index, entry.timestamp, entry.message.into_bytes()))
    }
}

/// Cache store backed by a Redis list.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
    key: String,
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl RedisCacheStore {
    /// Connect to Redis and use the list at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Unavailable {
            message: format!("invalid Redis URL: {e}"),
        })?;
        let conn = ConnectionManager::new(client).await?;
        let key = key.into();

        tracing::info!(key = %key, "Connected to Redis cache");
        Ok(Self { conn, key })
    }

    async fn lindex(&self, position: u64) -> Result<Option<CacheEntry>, CacheError> {
        let index = i64::try_from(position).map_err(|_| CacheError::Backend {
            message: format!("position {position} out of range"),
        })?;
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("LINDEX")
            .arg(&self.key)
            .arg(index)
            .query_async(&mut conn)
            .await?;
        raw.map(|raw| StoredEntry::decode(position, &raw)).transpose()
    }
}

#[async_trait]
impl CacheStorePort for RedisCacheStore {
    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn len(&self) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let len: u64 = redis::cmd("LLEN")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn get_n(&self, position: u64) -> Result<Option<CacheEntry>, CacheError> {
        self.lindex(position).await
    }

    async fn get_first(&self) -> Result<CacheEntry, CacheError> {
        self.lindex(0).await?.ok_or(CacheError::Empty)
    }

    async fn remove_first(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: Option<String> = redis::cmd("LPOP")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn append(&self, payload: &[u8]) -> Result<(), CacheError> {
        let record = StoredEntry::encode(Utc::now().timestamp(), payload)?;
        let mut conn = self.conn.clone();
        let _: u64 = redis::cmd("RPUSH")
            .arg(&self.key)
            .arg(record)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_entry_format() {
        let raw = StoredEntry::encode(1_700_000_000, br#"{"e":"aggTrade"}"#).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000);
        assert_eq!(value["message"], r#"{"e":"aggTrade"}"#);
    }

    #[test]
    fn decodes_stored_entry() {
        let entry = StoredEntry::decode(4, r#"{"timestamp":42,"message":"hello"}"#).unwrap();
        assert_eq!(entry, CacheEntry::new(4, 42, b"hello".to_vec()));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let raw = StoredEntry::encode(1, &[0x66, 0xff, 0x6f]).unwrap();
        let entry = StoredEntry::decode(0, &raw).unwrap();
        assert_eq!(String::from_utf8(entry.payload).unwrap(), "f\u{fffd}o");
    }

    #[test]
    fn corrupt_record_reports_position() {
        let err = StoredEntry::decode(9, "not json").unwrap_err();
        assert!(matches!(err, CacheError::CorruptEntry { index: 9, .. }));
    }
}
