use dashmap::DashMap;
use std::{
    future::Future,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

/// A cached value and when it was stored.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

/// Single-flight gate for one key. `epoch` moves whenever the key is
/// invalidated while the gate is held.
#[derive(Debug, Default)]
struct Gate {
    lock: Mutex<()>,
    epoch: AtomicU64,
}

/// TTL cache bounded by entry count, with single-flight loading.
///
/// Expired entries are invisible to readers but stay resident until they are
/// overwritten, swept by [`TtlCache::cleanup_expired`], or evicted when the
/// cache is full. When the capacity is reached the oldest entries go first.
#[derive(Debug)]
pub struct TtlCache<K: Clone + Eq + Hash, V> {
    data: DashMap<K, CacheEntry<V>>,
    inflight: DashMap<K, Arc<Gate>>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            data: DashMap::new(),
            inflight: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.peek(key);
        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Like [`TtlCache::get`], without touching the metrics.
    fn peek(&self, key: &K) -> Option<V> {
        self.data
            .get(key)
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        if !self.data.contains_key(&key) && self.data.len() >= self.capacity {
            self.make_room();
        }
        self.data.insert(key, CacheEntry::new(value));
    }

    /// Removes an entry unconditionally. Returns whether one was resident.
    pub fn invalidate(&self, key: &K) -> bool {
        if let Some(gate) = self.inflight.get(key) {
            gate.epoch.fetch_add(1, Ordering::AcqRel);
        }
        let removed = self.data.remove(key).is_some();
        if removed {
            debug!("Cache entry invalidated: {:?}", key);
        }
        removed
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// result.
    ///
    /// Concurrent callers for the same key queue behind the one in-flight
    /// fetch and then read its result from the cache. Failures are never
    /// cached: the error goes to the caller that ran the fetch, and the next
    /// queued caller fetches again.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let gate = self
            .inflight
            .entry(key.clone())
            .or_insert_with(Default::default)
            .clone();
        let guard = gate.lock.lock().await;

        let result = match self.peek(&key) {
            Some(value) => Ok(value),
            None => {
                debug!("Cache miss, fetching {:?}", key);
                let epoch = gate.epoch.load(Ordering::Acquire);
                let fetched = fetch().await;
                if let Ok(value) = &fetched {
                    // The key was invalidated during the fetch; hand the value
                    // to the caller but do not keep it.
                    if gate.epoch.load(Ordering::Acquire) == epoch {
                        self.insert(key.clone(), value.clone());
                    }
                }
                fetched
            }
        };

        drop(guard);
        self.inflight
            .remove_if(&key, |_, gate| Arc::strong_count(gate) <= 2);

        result
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drops expired entries and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.data.len();
        let ttl = self.ttl;
        self.data.retain(|_, entry| !entry.is_expired(ttl));
        let removed = before.saturating_sub(self.data.len());

        if removed > 0 {
            debug!("Removed {} expired cache entries", removed);
        }

        removed
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.data.len(),
        }
    }

    fn make_room(&self) {
        if self.cleanup_expired() > 0 && self.data.len() < self.capacity {
            return;
        }

        // Evict the oldest sixteenth in one pass so a full cache does not scan
        // on every insert.
        let mut entries: Vec<(K, Instant)> = self
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().inserted_at))
            .collect();
        entries.sort_by_key(|(_, inserted_at)| *inserted_at);

        let count = (self.capacity / 16).max(1);
        for (key, _) in entries.into_iter().take(count) {
            if self.data.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Hit, miss and eviction counters.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
