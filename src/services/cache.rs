//! Cache layer.
//!
//! Two lifecycles: short TTL for data that changes frequently (balances,
//! resolved contract suites, split visibility) and permanent for data that
//! is immutable once computed (historical ruleset cycles). Both are
//! explicitly constructed and injectable so tests get isolated instances.
//! Writes are idempotent last-writer-wins; recomputation is pure given the
//! same inputs, so no locking is needed around readers.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

/// Cache key for per-project data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectKey {
    pub chain_id: u64,
    pub project_id: u64,
}

/// Short-lived cache: entries are re-fetched after the TTL elapses.
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Cache<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();
        Self {
            inner: Arc::new(inner),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Permanent cache: no TTL, for cryptographically immutable derivations.
#[derive(Clone)]
pub struct PermanentCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Cache<K, V>>,
}

impl<K, V> PermanentCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let inner = Cache::builder().max_capacity(10_000).build();
        Self {
            inner: Arc::new(inner),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }
}

impl<K, V> Default for PermanentCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ttl_cache_expires_entries() {
        let cache: TtlCache<ProjectKey, u64> = TtlCache::new(Duration::from_millis(50));
        let key = ProjectKey {
            chain_id: 1,
            project_id: 42,
        };

        cache.insert(key, 7).await;
        assert_eq!(cache.get(&key).await, Some(7));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn writes_are_last_writer_wins() {
        let cache: TtlCache<ProjectKey, u64> = TtlCache::new(Duration::from_secs(60));
        let key = ProjectKey {
            chain_id: 10,
            project_id: 1,
        };

        cache.insert(key, 1).await;
        cache.insert(key, 2).await;
        assert_eq!(cache.get(&key).await, Some(2));
    }

    #[tokio::test]
    async fn permanent_cache_keeps_entries() {
        let cache: PermanentCache<(u64, u64), String> = PermanentCache::new();
        cache.insert((1, 1), "stage".to_string()).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get(&(1, 1)).await, Some("stage".to_string()));
    }
}
