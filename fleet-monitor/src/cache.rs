//! Single-entry TTL cache for poll results.
//!
//! The cache is an explicit object owned by the monitor and passed by
//! reference where needed; there is no ambient global snapshot state. One
//! entry suffices because callers always ask about the same fleet set (or
//! the same single agent for container inventories).

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<K, V> {
    key: K,
    taken_at: Instant,
    value: V,
}

/// Single-entry cache keyed by the exact query input.
///
/// A hit requires both an equal key and an entry younger than the TTL.
pub struct SnapshotCache<K, V> {
    ttl: Duration,
    entry: Mutex<Option<Entry<K, V>>>,
}

impl<K: PartialEq, V: Clone> SnapshotCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value if `key` matches and the entry is fresh.
    pub fn get(&self, key: &K) -> Option<V> {
        let guard = self.entry.lock().expect("cache mutex poisoned");
        match guard.as_ref() {
            Some(entry) if entry.key == *key && entry.taken_at.elapsed() < self.ttl => {
                Some(entry.value.clone())
            }
            _ => None,
        }
    }

    /// Replace the cache with a freshly taken value.
    pub fn put(&self, key: K, value: V) {
        let mut guard = self.entry.lock().expect("cache mutex poisoned");
        *guard = Some(Entry {
            key,
            taken_at: Instant::now(),
            value,
        });
    }

    /// Drop the cached entry, forcing the next query to poll.
    pub fn invalidate(&self) {
        let mut guard = self.entry.lock().expect("cache mutex poisoned");
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_requires_same_key() {
        let cache: SnapshotCache<Vec<&str>, u32> = SnapshotCache::new(Duration::from_secs(10));
        cache.put(vec!["a", "b"], 7);

        assert_eq!(cache.get(&vec!["a", "b"]), Some(7));
        assert_eq!(cache.get(&vec!["a"]), None);
    }

    #[test]
    fn test_expiry() {
        let cache: SnapshotCache<u8, u32> = SnapshotCache::new(Duration::from_millis(10));
        cache.put(1, 42);
        assert_eq!(cache.get(&1), Some(42));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn test_invalidate() {
        let cache: SnapshotCache<u8, u32> = SnapshotCache::new(Duration::from_secs(10));
        cache.put(1, 42);
        cache.invalidate();
        assert_eq!(cache.get(&1), None);
    }
}
