//! Bounded LRU cache over match results
//!
//! Keys are the normalized input key prefixed with a strategy-version tag,
//! so a strategy change invalidates old entries without a flush. Positive
//! and negative results share the same LRU bound.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;

/// Bump when strategy semantics change; cached results from older
/// strategies must not be served.
pub const STRATEGY_VERSION: &str = "v1";

/// Cache hit/miss counters, exported through the statistics report.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU-bounded match result cache. `None` capacity disables caching
/// entirely; all operations become no-ops.
pub struct MatchCache<V: Clone> {
    inner: Option<Mutex<LruCache<String, V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> MatchCache<V> {
    pub fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A disabled cache: every lookup misses, every insert is dropped.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Versioned cache key for a normalized input.
    pub fn key(normalized: &str) -> String {
        format!("{}:{}", STRATEGY_VERSION, normalized)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let inner = self.inner.as_ref()?;
        let mut cache = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match cache.get(key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: String, value: V) {
        if let Some(inner) = self.inner.as_ref() {
            let mut cache = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.put(key, value);
        }
    }

    pub fn clear(&self) {
        if let Some(inner) = self.inner.as_ref() {
            let mut cache = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.clear();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        match self.inner.as_ref() {
            Some(inner) => inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
