//! Generic sweep cache used by every per-stage cache in `dns::*`
//! (spec.md §3 "Invariants", §5 "Resource caps").
//!
//! Backed by a single `RwLock<HashMap>` rather than a lock-free structure —
//! the teacher crate has no caching layer to ground this on directly, so
//! this follows `original_source/cache.go`'s own approach (one `RWMutex`
//! guarding one map per cache, `ClearCache` replacing the map wholesale)
//! translated into the closest idiomatic Rust shape. Reaching `max_size`
//! triggers a full flush rather than eviction, and a separate sweep pass
//! implements the two-class approximate-LRU described in spec.md §5.

pub mod rotation;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

struct Entry<V> {
    value: V,
    recent: AtomicBool,
}

/// A capped, sweep-evicted cache from `K` to `V`.
pub struct SweepCache<K, V> {
    inner: RwLock<HashMap<K, Entry<V>>>,
    max_size: usize,
}

impl<K, V> SweepCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_size: usize) -> Self {
        SweepCache {
            inner: RwLock::new(HashMap::new()),
            max_size,
        }
    }

    /// Look up `key`. On hit, marks the entry recent for the next sweep.
    pub async fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().await;
        let entry = map.get(key)?;
        entry.recent.store(true, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Insert `value` under `key`. If the cache is already at `max_size`,
    /// the whole map is flushed first (spec.md §5: "reaching it triggers a
    /// full flush, not LRU eviction").
    pub async fn insert(&self, key: K, value: V) {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_size && !map.contains_key(&key) {
            log::debug!("cache reached max_size={}, flushing", self.max_size);
            map.clear();
        }
        map.insert(
            key,
            Entry {
                value,
                recent: AtomicBool::new(true),
            },
        );
    }

    /// Bulk invalidation: replace the underlying mapping atomically
    /// (spec.md §3 "Invariants").
    pub async fn clear(&self) {
        let mut map = self.inner.write().await;
        *map = HashMap::new();
    }

    /// Two-pass approximate LRU: drop everything not touched since the last
    /// sweep, then clear the recent flag for survivors (spec.md §5).
    pub async fn sweep(&self) {
        let mut map = self.inner.write().await;
        map.retain(|_, entry| entry.recent.swap(false, Ordering::Relaxed));
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

/// A cache that only ever stores a single key-shaped atomic replacement
/// target: used by the view cache (§4.D), whose documented overflow policy
/// is "replace the entire mapping" rather than per-entry sweep.
pub type ReplaceOnOverflowCache<K, V> = SweepCache<K, V>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_insert_roundtrip() {
        let cache: SweepCache<String, i32> = SweepCache::new(10);
        cache.insert("a".to_string(), 1).await;
        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
        assert_eq!(cache.get(&"missing".to_string()).await, None);
    }

    #[tokio::test]
    async fn overflow_flushes_whole_cache() {
        let cache: SweepCache<i32, i32> = SweepCache::new(2);
        cache.insert(1, 1).await;
        cache.insert(2, 2).await;
        cache.insert(3, 3).await; // triggers a flush before inserting
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.get(&3).await, Some(3));
    }

    #[tokio::test]
    async fn sweep_drops_entries_untouched_since_last_sweep() {
        let cache: SweepCache<i32, i32> = SweepCache::new(10);
        cache.insert(1, 1).await;
        cache.insert(2, 2).await;
        cache.get(&1).await; // touch 1, leave 2 untouched
        cache.sweep().await;
        assert_eq!(cache.get(&1).await, Some(1));
        assert_eq!(cache.get(&2).await, None);
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let cache: SweepCache<i32, i32> = SweepCache::new(10);
        cache.insert(1, 1).await;
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
