//! Replay Cache
//!
//! Wraps a `CacheStorePort` with the availability probe, best-effort appends
//! and retention pruning.
//!
//! The probe runs once. A store that fails it is never used for the rest of
//! the process: `ReplayCache::connect` returns `None` and every call site
//! branches on presence.

use std::sync::Arc;

use chrono::Utc;

use crate::application::ports::{CacheError, CacheStorePort};
use crate::domain::retention::RetentionPolicy;
use crate::domain::trade::CacheEntry;
use crate::infrastructure::metrics;

/// Replay cache backed by an external store.
#[derive(Clone)]
pub struct ReplayCache {
    store: Arc<dyn CacheStorePort>,
    retention: RetentionPolicy,
}

impl std::fmt::Debug for ReplayCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayCache")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl ReplayCache {
    /// Probe the store and wrap it if available.
    pub async fn connect(store: Arc<dyn CacheStorePort>, retention: RetentionPolicy) -> Option<Self> {
        match store.ping().await {
            Ok(()) => {
                tracing::info!(
                    retention_secs = retention.window().as_secs(),
                    "Replay cache available"
                );
                Some(Self { store, retention })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Replay cache not available, trades will not be cached");
                None
            }
        }
    }

    /// Retention policy in effect.
    #[must_use]
    pub const fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Number of entries currently stored.
    pub async fn len(&self) -> Result<u64, CacheError> {
        self.store.len().await
    }

    /// Entry at `position`, or `None` past the end.
    pub async fn get_n(&self, position: u64) -> Result<Option<CacheEntry>, CacheError> {
        self.store.get_n(position).await
    }

    /// Append a raw payload. Failures are logged, never propagated.
    pub async fn append(&self, payload: &[u8]) {
        match self.store.append(payload).await {
            Ok(()) => metrics::record_cache_append(),
            Err(e) => {
                metrics::record_cache_error("append");
                tracing::warn!(error = %e, "Failed to append trade to cache");
            }
        }
    }

    /// Remove every leading entry older than the retention window.
    ///
    /// Returns the number of entries removed.
    pub async fn prune(&self) -> u64 {
        self.prune_at(Utc::now().timestamp()).await
    }

    /// Prune relative to `now` (seconds since the Unix epoch).
    ///
    /// Stops at the first entry inside the window, or on any store error.
    pub async fn prune_at(&self, now: i64) -> u64 {
        let mut removed = 0u64;

        loop {
            let Ok(oldest) = self.store.get_first().await else {
                break;
            };

            if !self.retention.is_expired(oldest.timestamp, now) {
                break;
            }

            if let Err(e) = self.store.remove_first().await {
                metrics::record_cache_error("remove_first");
                tracing::warn!(error = %e, index = oldest.index, "Failed to remove expired cache entry");
                break;
            }
            removed += 1;
        }

        if removed > 0 {
            metrics::record_cache_pruned(removed);
            tracing::debug!(removed, "Pruned expired cache entries");
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::ports::MockCacheStorePort;
    use crate::infrastructure::cache::InMemoryCacheStore;

    const NOW: i64 = 1_700_000_000;
    const HOUR: i64 = 3600;

    async fn cache_with(store: &Arc<InMemoryCacheStore>) -> ReplayCache {
        ReplayCache::connect(store.clone(), RetentionPolicy::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn connect_fails_when_ping_fails() {
        let mut store = MockCacheStorePort::new();
        store.expect_ping().times(1).returning(|| {
            Err(CacheError::Unavailable {
                message: "connection refused".to_string(),
            })
        });
        store.expect_len().never();
        store.expect_get_n().never();

        let cache = ReplayCache::connect(Arc::new(store), RetentionPolicy::default()).await;
        assert!(cache.is_none());
    }

    #[tokio::test]
    async fn prune_removes_only_expired_prefix() {
        let store = Arc::new(InMemoryCacheStore::new());
        store.push_entry(NOW - 3 * HOUR, b"a");
        store.push_entry(NOW - 2 * HOUR - 1, b"b");
        store.push_entry(NOW - 2 * HOUR, b"c");
        store.push_entry(NOW - HOUR, b"d");
        let cache = cache_with(&store).await;

        assert_eq!(cache.prune_at(NOW).await, 2);
        assert_eq!(store.entry_count(), 2);

        let first = store.get_first().await.unwrap();
        assert_eq!(first.payload, b"c");
    }

    #[tokio::test]
    async fn prune_is_idempotent() {
        let store = Arc::new(InMemoryCacheStore::new());
        store.push_entry(NOW - 5 * HOUR, b"a");
        store.push_entry(NOW - 10, b"b");
        let cache = cache_with(&store).await;

        assert_eq!(cache.prune_at(NOW).await, 1);
        assert_eq!(cache.prune_at(NOW).await, 0);
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn prune_stops_at_first_fresh_entry() {
        // An expired entry behind a fresh one is left for a later pass.
        let store = Arc::new(InMemoryCacheStore::new());
        store.push_entry(NOW - 10, b"fresh");
        store.push_entry(NOW - 5 * HOUR, b"stale");
        let cache = cache_with(&store).await;

        assert_eq!(cache.prune_at(NOW).await, 0);
        assert_eq!(store.entry_count(), 2);
    }

    #[tokio::test]
    async fn prune_on_empty_cache_is_noop() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = cache_with(&store).await;
        assert_eq!(cache.prune_at(NOW).await, 0);
    }

    #[tokio::test]
    async fn prune_stops_on_remove_error() {
        let mut store = MockCacheStorePort::new();
        store.expect_ping().returning(|| Ok(()));
        store
            .expect_get_first()
            .times(1)
            .returning(|| Ok(CacheEntry::new(0, 1, b"old".to_vec())));
        store.expect_remove_first().times(1).returning(|| {
            Err(CacheError::Backend {
                message: "READONLY".to_string(),
            })
        });

        let cache = ReplayCache::connect(Arc::new(store), RetentionPolicy::default())
            .await
            .unwrap();
        assert_eq!(cache.prune_at(NOW).await, 0);
    }

    #[tokio::test]
    async fn custom_retention_window() {
        let store = Arc::new(InMemoryCacheStore::new());
        store.push_entry(NOW - 120, b"a");
        store.push_entry(NOW - 30, b"b");
        let cache = ReplayCache::connect(
            store.clone(),
            RetentionPolicy::new(Duration::from_secs(60)),
        )
        .await
        .unwrap();

        assert_eq!(cache.prune_at(NOW).await, 1);
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn append_failure_is_swallowed() {
        let mut store = MockCacheStorePort::new();
        store.expect_ping().returning(|| Ok(()));
        store.expect_append().times(1).returning(|_| {
            Err(CacheError::Backend {
                message: "OOM".to_string(),
            })
        });

        let cache = ReplayCache::connect(Arc::new(store), RetentionPolicy::default())
            .await
            .unwrap();
        cache.append(b"{}").await;
    }
}
