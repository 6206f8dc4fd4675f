//! In-memory TTL cache with stale fallback.
//!
//! Entries are fresh for `ttl` after insertion. Expired entries are kept
//! around for a while longer so a caller whose upstream just failed can still
//! serve the last good value, flagged as [`CacheStatus::Stale`].

use std::{
    collections::HashMap,
    hash::Hash,
    time::{Duration, SystemTime},
};

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Expired entries survive this many TTLs before being purged.
const STALE_RETENTION_FACTOR: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// Just fetched from upstream.
    Fresh,
    /// Served from cache within the TTL.
    Cached,
    /// Served from cache past the TTL because upstream failed.
    Stale,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::Cached => "cached",
            CacheStatus::Stale => "stale",
        }
    }
}

#[derive(Clone, Debug)]
pub struct CachedPayload<T> {
    pub data: T,
    pub fetched_at: SystemTime,
    pub status: CacheStatus,
}

impl<T> CachedPayload<T> {
    pub fn new(data: T, fetched_at: SystemTime, status: CacheStatus) -> Self {
        Self {
            data,
            fetched_at,
            status,
        }
    }

    pub fn fresh(data: T) -> Self {
        Self::new(data, SystemTime::now(), CacheStatus::Fresh)
    }
}

struct Cached<T> {
    value: T,
    fetched_at: SystemTime,
    inserted: Instant,
}

impl<T: Clone> Cached<T> {
    fn new(value: T, fetched_at: SystemTime) -> Self {
        Self {
            value,
            fetched_at,
            inserted: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted.elapsed() < ttl
    }

    fn if_fresh(&self, ttl: Duration) -> Option<CachedPayload<T>> {
        self.is_fresh(ttl).then(|| {
            CachedPayload::new(self.value.clone(), self.fetched_at, CacheStatus::Cached)
        })
    }

    fn stale(&self) -> CachedPayload<T> {
        CachedPayload::new(self.value.clone(), self.fetched_at, CacheStatus::Stale)
    }
}

/// Keyed TTL cache. A zero TTL disables it entirely.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Cached<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub async fn get_fresh(&self, key: &K) -> Option<CachedPayload<V>> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|entry| entry.if_fresh(self.ttl))
    }

    /// Last stored value regardless of age, as long as it has not been purged.
    pub async fn get_stale(&self, key: &K) -> Option<CachedPayload<V>> {
        let entries = self.entries.lock().await;
        entries.get(key).map(Cached::stale)
    }

    /// Store a value just fetched from upstream and hand it back as
    /// [`CacheStatus::Fresh`].
    pub async fn insert(&self, key: K, value: V) -> CachedPayload<V> {
        let payload = CachedPayload::fresh(value);
        if !self.is_enabled() {
            return payload;
        }
        let retention = self.ttl.saturating_mul(STALE_RETENTION_FACTOR);
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.inserted.elapsed() < retention);
        entries.insert(key, Cached::new(payload.data.clone(), payload.fetched_at));
        payload
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fresh_then_stale_then_purged() {
        let cache = TtlCache::new(Duration::from_secs(10));
        let stored = cache.insert("k", 1).await;
        assert_eq!(stored.status, CacheStatus::Fresh);

        let hit = cache.get_fresh(&"k").await.expect("fresh");
        assert_eq!(hit.data, 1);
        assert_eq!(hit.status, CacheStatus::Cached);
        assert_eq!(hit.fetched_at, stored.fetched_at);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get_fresh(&"k").await.is_none());
        let stale = cache.get_stale(&"k").await.expect("stale");
        assert_eq!(stale.status.as_str(), "stale");

        tokio::time::advance(Duration::from_secs(60)).await;
        cache.insert("other", 2).await;
        assert!(cache.get_stale(&"k").await.is_none());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn zero_ttl_disables_cache() {
        let cache = TtlCache::new(Duration::ZERO);
        let stored = cache.insert("k", 1).await;
        assert_eq!(stored.status.as_str(), "fresh");
        assert!(cache.get_fresh(&"k").await.is_none());
        assert!(cache.get_stale(&"k").await.is_none());
    }
}
