//! Bounded, time-aware concurrent cache
//!
//! A least-recently-used map whose entries also expire a fixed time after
//! they were last written. Shared by the check-decision cache and the
//! token-claims cache; the lock is held only for the map operation itself.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::clock::{elapsed, Clock};

struct Slot<V> {
    value: V,
    updated_at: DateTime<Utc>,
}

/// Outcome of [`TtlLruCache::lookup_mut`]
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<R, V> {
    /// Live entry; carries the closure's result
    Hit(R),
    /// Entry had outlived the TTL and was removed
    Expired(V),
    Miss,
}

/// LRU cache with a per-entry time-to-live measured from the last write
pub struct TtlLruCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, Slot<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K: Hash + Eq, V> TtlLruCache<K, V> {
    pub fn new(capacity: NonZeroUsize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    /// Build a cache, or `None` when `capacity` is zero (caching disabled)
    pub fn bounded(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Option<Self> {
        NonZeroUsize::new(capacity).map(|cap| Self::new(cap, ttl, clock))
    }

    /// Run `f` against a live entry, promoting it to most recently used.
    ///
    /// An expired entry is evicted and handed back instead.
    pub fn lookup_mut<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Lookup<R, V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get_mut(key) {
            None => return Lookup::Miss,
            Some(slot) => {
                if !self.is_expired(slot, now) {
                    return Lookup::Hit(f(&mut slot.value));
                }
            }
        }

        match entries.pop(key) {
            Some(slot) => {
                trace!("Evicted expired cache entry");
                Lookup::Expired(slot.value)
            }
            None => Lookup::Miss,
        }
    }

    /// Clone out a live entry
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        match self.lookup_mut(key, |value| value.clone()) {
            Lookup::Hit(value) => Some(value),
            _ => None,
        }
    }

    /// Insert or overwrite an entry, restarting its TTL.
    ///
    /// Returns the least-recently-used entry pushed out to make room, if any.
    pub fn insert(&self, key: K, value: V) -> Option<(K, V)> {
        let slot = Slot {
            value,
            updated_at: self.clock.now(),
        };
        let mut entries = self.entries.lock();

        if entries.contains(&key) {
            entries.put(key, slot);
            return None;
        }

        entries.push(key, slot).map(|(key, slot)| (key, slot.value))
    }

    /// Remove every entry that has outlived the TTL
    pub fn purge_expired(&self) -> Vec<(K, V)>
    where
        K: Clone,
    {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, slot)| self.is_expired(slot, now))
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| entries.pop(&key).map(|slot| (key, slot.value)))
            .collect()
    }

    /// Visit every entry without touching recency or TTL
    pub fn for_each_mut(&self, mut f: impl FnMut(&K, &mut V)) {
        let mut entries = self.entries.lock();
        for (key, slot) in entries.iter_mut() {
            f(key, &mut slot.value);
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn is_expired(&self, slot: &Slot<V>, now: DateTime<Utc>) -> bool {
        elapsed(slot.updated_at, now) >= self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache(capacity: usize, ttl_secs: u64) -> (Arc<ManualClock>, TtlLruCache<String, u32>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let cache = TtlLruCache::bounded(capacity, Duration::from_secs(ttl_secs), clock.clone())
            .unwrap();
        (clock, cache)
    }

    #[test]
    fn test_zero_capacity_disables() {
        let clock = Arc::new(ManualClock::at_epoch());
        assert!(TtlLruCache::<String, u32>::bounded(0, Duration::from_secs(1), clock).is_none());
    }

    #[test]
    fn test_get_and_expire() {
        let (clock, cache) = cache(4, 2);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        clock.tick();
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        clock.tick();
        assert_eq!(
            cache.lookup_mut(&"a".to_string(), |v| *v),
            Lookup::Expired(1)
        );
        assert_eq!(cache.lookup_mut(&"a".to_string(), |v| *v), Lookup::Miss);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_restarts_ttl() {
        let (clock, cache) = cache(4, 2);
        cache.insert("a".to_string(), 1);
        clock.tick();
        cache.insert("a".to_string(), 2);
        clock.tick();
        assert_eq!(cache.get(&"a".to_string()), Some(2));
    }

    #[test]
    fn test_lru_eviction_returns_victim() {
        let (_clock, cache) = cache(2, 60);
        assert!(cache.insert("a".to_string(), 1).is_none());
        assert!(cache.insert("b".to_string(), 2).is_none());

        // touch "a" so "b" becomes least recently used
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        let evicted = cache.insert("c".to_string(), 3);
        assert_eq!(evicted, Some(("b".to_string(), 2)));
        assert_eq!(cache.len(), 2);

        // overwriting an existing key never evicts
        assert!(cache.insert("c".to_string(), 4).is_none());
    }

    #[test]
    fn test_purge_expired() {
        let (clock, cache) = cache(4, 2);
        cache.insert("old".to_string(), 1);
        clock.tick();
        cache.insert("new".to_string(), 2);
        clock.tick();

        let purged = cache.purge_expired();
        assert_eq!(purged, vec![("old".to_string(), 1)]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_for_each_mut() {
        let (_clock, cache) = cache(4, 60);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.for_each_mut(|_, v| *v *= 10);
        assert_eq!(cache.get(&"a".to_string()), Some(10));
        assert_eq!(cache.get(&"b".to_string()), Some(20));
    }

    #[test]
    fn test_concurrent_inserts_respect_capacity() {
        let (_clock, cache) = cache(8, 60);
        std::thread::scope(|s| {
            for t in 0..4 {
                let cache = &cache;
                s.spawn(move || {
                    for i in 0..50 {
                        cache.insert(format!("{}-{}", t, i), i);
                    }
                });
            }
        });
        assert_eq!(cache.len(), 8);
    }
}
