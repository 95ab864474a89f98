//! Short-lived snapshot cache with TTL expiry and an LRU entry bound.

use chrono::{DateTime, Utc};
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::time::Duration;
use tracing::debug;

use crate::model::{QueryKey, WeatherSnapshot};

pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_CAPACITY: usize = 20;

/// A snapshot together with the wall-clock time it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub snapshot: WeatherSnapshot,
    pub fetched_at: DateTime<Utc>,
}

impl CachedSnapshot {
    pub fn now(snapshot: WeatherSnapshot) -> Self {
        Self {
            snapshot,
            fetched_at: Utc::now(),
        }
    }
}

/// Backed by a moka cache in strict LRU mode. Maintenance runs on every
/// write so the entry bound holds as soon as `insert` returns.
pub struct SnapshotCache {
    entries: Cache<QueryKey, CachedSnapshot>,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl SnapshotCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity.max(1) as u64)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(|key, _value, cause| {
                if cause == RemovalCause::Size {
                    debug!(%key, "evicting least recently used cache entry");
                }
            })
            .build();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fresh snapshot for `key`, if any.
    pub fn get(&self, key: &QueryKey) -> Option<CachedSnapshot> {
        self.entries.get(key)
    }

    /// Insert or replace, evicting the least recently used entry when full.
    pub fn insert(&self, key: QueryKey, value: CachedSnapshot) {
        // Pending reads first, so recency is up to date when eviction picks a victim.
        self.entries.run_pending_tasks();
        self.entries.insert(key, value);
        self.entries.run_pending_tasks();
    }

    pub fn remove(&self, key: &QueryKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(city: &str) -> CachedSnapshot {
        CachedSnapshot::now(WeatherSnapshot {
            city: city.to_string(),
            description: "clear sky".to_string(),
            temperature: 20.0,
            feels_like: None,
            humidity: None,
            wind_speed: None,
            icon: None,
        })
    }

    fn key(city: &str) -> QueryKey {
        QueryKey::Name(city.to_string())
    }

    #[test]
    fn hit_within_ttl() {
        let cache = SnapshotCache::default();
        cache.insert(key("oslo"), snapshot("Oslo"));

        let hit = cache.get(&key("oslo")).expect("entry is fresh");
        assert_eq!(hit.snapshot.city, "Oslo");
    }

    #[test]
    fn expired_entries_are_dropped_on_lookup() {
        let cache = SnapshotCache::new(Duration::from_millis(50), DEFAULT_CAPACITY);
        cache.insert(key("oslo"), snapshot("Oslo"));
        assert!(cache.contains(&key("oslo")));

        std::thread::sleep(Duration::from_millis(120));

        assert_eq!(cache.get(&key("oslo")), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let cache = SnapshotCache::new(DEFAULT_TTL, 3);
        cache.insert(key("a"), snapshot("A"));
        cache.insert(key("b"), snapshot("B"));
        cache.insert(key("c"), snapshot("C"));

        // Touch "a" so "b" becomes the oldest.
        assert!(cache.get(&key("a")).is_some());

        cache.insert(key("d"), snapshot("D"));

        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert!(cache.contains(&key("d")));
    }

    #[test]
    fn replacing_existing_key_does_not_evict() {
        let cache = SnapshotCache::new(DEFAULT_TTL, 2);
        cache.insert(key("a"), snapshot("A"));
        cache.insert(key("b"), snapshot("B"));
        cache.insert(key("a"), snapshot("A2"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key("a")).map(|c| c.snapshot.city), Some("A2".to_string()));
    }

    #[test]
    fn default_bound_is_twenty() {
        let cache = SnapshotCache::default();
        for i in 0..30 {
            cache.insert(key(&format!("city-{i}")), snapshot("X"));
        }

        assert_eq!(cache.len(), DEFAULT_CAPACITY);
        assert!(!cache.contains(&key("city-9")));
        assert!(cache.contains(&key("city-10")));
    }

    #[test]
    fn remove_entry() {
        let cache = SnapshotCache::default();
        cache.insert(key("a"), snapshot("A"));

        assert!(cache.remove(&key("a")));
        assert!(!cache.remove(&key("a")));
        assert_eq!(cache.get(&key("a")), None);
    }
}
