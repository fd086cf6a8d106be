//! Read-through cache and invalidation policy
//!
//! Read models (product lists, 30-day summaries) are cached as JSON under
//! fixed keys. Mutations evict the keys their [`CacheEvent`] names once the
//! unit of work has committed. Coherence is best effort: a stale entry lives
//! at most one TTL.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

mod memory;
pub mod policy;
mod redis_store;

pub use memory::InMemoryCache;
pub use policy::{keys, CacheEvent};
pub use redis_store::RedisCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

/// Minimal key-value contract the cache needs from its backend
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Get-or-populate wrapper over a [`CacheStore`] with a fixed TTL
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ReadThroughCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryCache::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, or run `loader` and cache its result.
    ///
    /// Null results and empty arrays are returned but not stored. Concurrent
    /// misses each run the loader.
    pub async fn get_or_set<T, E, F, Fut>(&self, key: &str, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    tracing::debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(e) => tracing::warn!(key, error = %e, "discarding undecodable cache entry"),
            },
            Ok(None) => tracing::debug!(key, "cache miss"),
            Err(e) => tracing::warn!(key, error = %e, "cache read failed, loading from store"),
        }

        let value = loader().await?;

        match serde_json::to_value(&value) {
            Ok(serde_json::Value::Null) => {}
            Ok(serde_json::Value::Array(items)) if items.is_empty() => {}
            Ok(json) => {
                let raw = json.to_string();
                if let Err(e) = self.store.set(key, &raw, Some(self.ttl)).await {
                    tracing::warn!(key, error = %e, "cache write failed");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "value not cacheable"),
        }

        Ok(value)
    }

    /// Evict every key of `event`. Failures are logged, never returned.
    pub async fn invalidate(&self, event: CacheEvent) {
        for key in event.keys() {
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!(?event, key, error = %e, "cache invalidation failed");
            }
        }
        tracing::debug!(?event, "cache keys evicted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingStore;

    #[async_trait]
    impl CacheStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
        async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<(), CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
    }

    fn cache_with(store: InMemoryCache) -> ReadThroughCache {
        ReadThroughCache::new(Arc::new(store), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = cache_with(InMemoryCache::new());
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let value: Vec<i32> = cache
                .get_or_set("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(vec![1, 2])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_stored() {
        let store = InMemoryCache::new();
        let cache = cache_with(store.clone());
        let _: Vec<i32> = cache
            .get_or_set("empty", || async { Ok::<_, CacheError>(Vec::new()) })
            .await
            .unwrap();
        let _: Option<i32> = cache
            .get_or_set("null", || async { Ok::<_, CacheError>(None) })
            .await
            .unwrap();
        assert!(!store.contains("empty").await);
        assert!(!store.contains("null").await);
    }

    #[tokio::test]
    async fn test_failing_backend_degrades_to_loader() {
        let cache = ReadThroughCache::new(Arc::new(FailingStore), Duration::from_secs(60));
        let value: i32 = cache
            .get_or_set("k", || async { Ok::<_, CacheError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        cache.invalidate(CacheEvent::SaleRecorded).await;
    }

    #[tokio::test]
    async fn test_invalidate_removes_event_keys_only() {
        let store = InMemoryCache::new();
        let cache = cache_with(store.clone());
        store.set(keys::PRODUCTS_ALL, "[1]", None).await.unwrap();
        store.set(keys::SUPPLIERS_ALL, "[1]", None).await.unwrap();
        cache.invalidate(CacheEvent::SaleRecorded).await;
        assert!(!store.contains(keys::PRODUCTS_ALL).await);
        assert!(store.contains(keys::SUPPLIERS_ALL).await);
    }
}
