//! In-Memory Cache Store
//!
//! Process-local `CacheStorePort` for development runs and tests. Nothing
//! survives a restart, so replay only covers trades seen by this process.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::application::ports::{CacheError, CacheStorePort};
use crate::domain::trade::CacheEntry;

/// Cache store backed by a `VecDeque`.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<VecDeque<CacheEntry>>,
    next_index: Mutex<u64>,
    unavailable: AtomicBool,
    get_n_calls: AtomicUsize,
}

impl InMemoryCacheStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose availability probe fails.
    #[must_use]
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.unavailable.store(true, Ordering::Relaxed);
        store
    }

    /// Append an entry with an explicit timestamp.
    pub fn push_entry(&self, timestamp: i64, payload: &[u8]) {
        let index = {
            let mut next = self.next_index.lock();
            let index = *next;
            *next += 1;
            index
        };
        self.entries
            .lock()
            .push_back(CacheEntry::new(index, timestamp, payload.to_vec()));
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Number of positional reads served so far.
    #[must_use]
    pub fn get_n_calls(&self) -> usize {
        self.get_n_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CacheStorePort for InMemoryCacheStore {
    async fn ping(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(CacheError::Unavailable {
                message: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn len(&self) -> Result<u64, CacheError> {
        Ok(u64::try_from(self.entry_count()).unwrap_or(u64::MAX))
    }

    async fn get_n(&self, position: u64) -> Result<Option<CacheEntry>, CacheError> {
        self.get_n_calls.fetch_add(1, Ordering::Relaxed);
        let Ok(position) = usize::try_from(position) else {
            return Ok(None);
        };
        Ok(self.entries.lock().get(position).cloned())
    }

    async fn get_first(&self) -> Result<CacheEntry, CacheError> {
        self.entries.lock().front().cloned().ok_or(CacheError::Empty)
    }

    async fn remove_first(&self) -> Result<(), CacheError> {
        self.entries.lock().pop_front();
        Ok(())
    }

    async fn append(&self, payload: &[u8]) -> Result<(), CacheError> {
        self.push_entry(Utc::now().timestamp(), payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_assigns_increasing_indexes() {
        let store = InMemoryCacheStore::new();
        store.append(b"a").await.unwrap();
        store.append(b"b").await.unwrap();
        store.remove_first().await.unwrap();
        store.append(b"c").await.unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        let first = store.get_first().await.unwrap();
        let last = store.get_n(1).await.unwrap().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(last.index, 2);
        assert_eq!(last.payload, b"c");
        assert!(last.has_timestamp());
    }

    #[tokio::test]
    async fn get_n_past_end_is_none() {
        let store = InMemoryCacheStore::new();
        store.push_entry(1, b"a");
        assert!(store.get_n(1).await.unwrap().is_none());
        assert_eq!(store.get_n_calls(), 1);
    }

    #[tokio::test]
    async fn get_first_on_empty_store_fails() {
        let store = InMemoryCacheStore::new();
        assert!(matches!(store.get_first().await, Err(CacheError::Empty)));
    }

    #[tokio::test]
    async fn unavailable_store_fails_ping() {
        assert!(InMemoryCacheStore::unavailable().ping().await.is_err());
        assert!(InMemoryCacheStore::new().ping().await.is_ok());
    }
}
