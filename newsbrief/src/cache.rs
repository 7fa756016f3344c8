//! Process-wide TTL caches.
//!
//! Each cache kind is its own [`TtlCache`] instance with its own TTL. Entries
//! are stamped by the caller; freshness is judged against an injectable
//! [`Clock`] so expiry can be tested without sleeping.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::model::{FilterMode, NewsItem, SummaryRecord};
use crate::redirect::RedirectRecord;

/// Source of "now" in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self { now: AtomicI64::new(start) }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub timestamp: i64,
}

/// Key → (value, timestamp) store with a fixed TTL.
///
/// There is no single-flight: two concurrent misses both recompute and the
/// later `put` wins.
pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: i64,
    clock: Arc<dyn Clock>,
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(name: &'static str, ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl: ttl_seconds,
            clock,
            entries: DashMap::new(),
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Fresh entry for `key`. An entry aged exactly `ttl` is still fresh.
    pub fn get(&self, key: &K) -> Option<CacheEntry<V>> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if now - entry.timestamp <= self.ttl {
            debug!(cache = self.name, "cache hit");
            Some(entry.value().clone())
        } else {
            debug!(cache = self.name, age = now - entry.timestamp, "cache entry stale");
            None
        }
    }

    pub fn put(&self, key: K, value: V, timestamp: i64) {
        self.entries.insert(key, CacheEntry { value, timestamp });
    }

    /// Store `value` stamped with the clock's current time.
    pub fn put_now(&self, key: K, value: V) {
        let now = self.clock.now();
        self.put(key, value, now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Query cache key: filter mode plus the normalized (trimmed, lower-cased) query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub mode: FilterMode,
    pub query: String,
}

impl QueryKey {
    pub fn new(mode: FilterMode, query: &str) -> Self {
        Self {
            mode,
            query: query.trim().to_lowercase(),
        }
    }
}

pub type QueryCache = TtlCache<QueryKey, Vec<NewsItem>>;
pub type RedirectCache = TtlCache<String, RedirectRecord>;
pub type SummaryCache = TtlCache<String, SummaryRecord>;
pub type TopicCache = TtlCache<String, Vec<NewsItem>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl: i64) -> (Arc<ManualClock>, TtlCache<String, u32>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = TtlCache::new("test", ttl, clock.clone());
        (clock, cache)
    }

    #[test]
    fn entry_aged_exactly_ttl_is_fresh() {
        let (clock, cache) = cache(600);
        cache.put("k".into(), 1, clock.now());

        clock.advance(600);
        assert_eq!(cache.get(&"k".into()).map(|e| e.value), Some(1));

        clock.advance(1);
        assert!(cache.get(&"k".into()).is_none());
    }

    #[test]
    fn put_overwrites_and_restamps() {
        let (clock, cache) = cache(10);
        cache.put_now("k".into(), 1);
        clock.advance(20);
        assert!(cache.get(&"k".into()).is_none());

        cache.put_now("k".into(), 2);
        let entry = cache.get(&"k".into()).expect("fresh entry");
        assert_eq!(entry.value, 2);
        assert_eq!(entry.timestamp, 1_020);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn query_key_normalizes_query() {
        assert_eq!(
            QueryKey::new(FilterMode::Finance, "  Nvidia Earnings "),
            QueryKey::new(FilterMode::Finance, "nvidia earnings")
        );
        assert_ne!(
            QueryKey::new(FilterMode::Finance, "nvidia"),
            QueryKey::new(FilterMode::General, "nvidia")
        );
    }
}
