//! In-memory cache tier with strict LRU eviction.
//!
//! Backed by `lru::LruCache` behind a `parking_lot::Mutex`. The tier is
//! bounded by entry count, not bytes: the overlay configuration expresses the
//! memory budget as a number of tiles. Inserting into a full cache evicts
//! exactly the least-recently-used entry; `get` updates recency.
//!
//! No operation performs I/O, so the tier is safe to consult from the
//! synchronous tile-request path.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::cache::key::CacheKey;

/// Fallback capacity when the configured entry count is zero or negative.
pub const DEFAULT_MEMORY_ENTRIES: usize = 50;

/// Bounded in-memory cache mapping [`CacheKey`] to a value.
///
/// Generic over the value type; the engine stores tile bytes, but resolved
/// URLs or any other cheaply clonable value work the same way. Safe for
/// concurrent use from any number of threads.
pub struct MemoryCache<V> {
    inner: Mutex<LruCache<CacheKey, V>>,
}

impl<V: Clone> MemoryCache<V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is clamped to one; configuration-level defaulting
    /// (zero or negative configured size falls back to
    /// [`DEFAULT_MEMORY_ENTRIES`]) happens in the overlay options.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a key, marking it most-recently-used on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    /// Whether a key is resident, without updating recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().contains(key)
    }

    /// Insert a value, evicting the least-recently-used entry if the cache
    /// is full. Replaces any existing value for the key.
    pub fn put(&self, key: CacheKey, value: V) {
        self.inner.lock().put(key, value);
    }

    /// Remove all entries. Idempotent.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Replace the capacity, evicting least-recently-used entries if the new
    /// capacity is smaller than the current population.
    pub fn resize(&self, capacity: usize) {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self.inner.lock().resize(capacity);
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }
}
