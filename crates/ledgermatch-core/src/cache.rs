//! Bounded least-recently-used match cache
//!
//! Ledgers repeat merchants constantly, so the engine memoizes one score
//! vector per normalized description. The cache is owned by the engine for a
//! single run and never persisted.
//!
//! Access goes through a `Mutex` so rows can be classified in parallel.
//! Values are computed outside the lock: two workers racing on the same key
//! both compute, and the second insert simply overwrites an identical value.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache (0.0 when unused)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<K, V> {
    /// key -> (value, last access tick)
    entries: HashMap<K, (V, u64)>,
    /// last access tick -> key, oldest first
    recency: BTreeMap<u64, K>,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn touch(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        let tick = self.tick;
        let (value, last) = self.entries.get_mut(key)?;
        self.recency.remove(&*last);
        *last = tick;
        self.recency.insert(tick, key.clone());
        Some(value.clone())
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((&tick, _)) = self.recency.iter().next() else {
            return false;
        };
        if let Some(key) = self.recency.remove(&tick) {
            self.entries.remove(&key);
        }
        true
    }
}

/// Thread-safe bounded LRU map
pub struct MatchCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K: Eq + Hash + Clone, V: Clone> MatchCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a key, refreshing its recency on a hit
    pub fn get(&self, key: &K) -> Option<V> {
        let found = match self.inner.lock() {
            Ok(mut inner) => inner.touch(key),
            Err(_) => None,
        };
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Insert or replace a value, evicting the least recently used entry
    /// when full
    pub fn insert(&self, key: K, value: V) {
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        let inner = &mut *guard;
        inner.tick += 1;
        let tick = inner.tick;

        let previous = inner.entries.get(&key).map(|(_, last)| *last);
        if let Some(last) = previous {
            inner.recency.remove(&last);
        } else if inner.entries.len() >= self.capacity && inner.evict_oldest() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        inner.recency.insert(tick, key.clone());
        inner.entries.insert(key, (value, tick));
    }

    /// Return the cached value or compute, store and return it
    #[cfg(test)]
    pub fn get_or_insert_with<F>(&self, key: &K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = compute();
        self.insert(key.clone(), value.clone());
        value
    }

    /// Whether a key is present, without touching recency or counters
    pub fn contains(&self, key: &K) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.capacity,
        }
    }
}
