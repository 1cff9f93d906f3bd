//! Process-wide shared services.
//!
//! The memory cache tier and the fetch pool are shared by every tile overlay
//! in the process, maximizing hit rate across overlays using the same tile
//! source. They are owned by an explicitly constructed [`SharedServices`]
//! object handed to each overlay at build time — there is no implicit
//! process-global state, and teardown is an explicit call.
//!
//! One consequence of sharing: an overlay update that changes
//! `memoryCacheSize` or `maxConcurrentRequests` reconfigures the shared tier
//! or pool for all overlays.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::cache::{MemoryCache, DEFAULT_MEMORY_ENTRIES};
use crate::fetch::{
    FetchError, FetchPool, ReqwestFetcher, TileFetcher, DEFAULT_CONCURRENT_REQUESTS,
};
use crate::telemetry::EngineMetrics;

/// Configuration for the shared services.
#[derive(Debug, Clone)]
pub struct SharedServicesConfig {
    /// Memory cache capacity in entries.
    pub memory_capacity: usize,
    /// Fetch pool concurrency limit.
    pub max_concurrent_requests: usize,
    /// HTTP request timeout.
    pub fetch_timeout: Duration,
}

impl Default for SharedServicesConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_ENTRIES,
            max_concurrent_requests: DEFAULT_CONCURRENT_REQUESTS,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared memory tier, fetch pool, fetcher and metrics.
///
/// Construct once at process startup (the composition root) and pass the
/// `Arc` to every overlay registry. Constructing spawns the pool dispatcher,
/// so a Tokio runtime must be running.
pub struct SharedServices {
    memory: MemoryCache<Bytes>,
    pool: FetchPool,
    fetcher: Arc<dyn TileFetcher>,
    metrics: Arc<EngineMetrics>,
}

impl SharedServices {
    /// Creates the services with a real HTTP fetcher.
    pub fn new(config: SharedServicesConfig) -> Result<Arc<Self>, FetchError> {
        let fetcher = Arc::new(ReqwestFetcher::with_timeout(config.fetch_timeout)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Creates the services with an injected fetcher (used by tests).
    pub fn with_fetcher(config: SharedServicesConfig, fetcher: Arc<dyn TileFetcher>) -> Arc<Self> {
        Arc::new(Self {
            memory: MemoryCache::new(config.memory_capacity),
            pool: FetchPool::new(config.max_concurrent_requests),
            fetcher,
            metrics: Arc::new(EngineMetrics::new()),
        })
    }

    /// The shared memory cache tier.
    pub fn memory(&self) -> &MemoryCache<Bytes> {
        &self.memory
    }

    /// The shared fetch pool.
    pub fn pool(&self) -> &FetchPool {
        &self.pool
    }

    /// The tile fetcher.
    pub fn fetcher(&self) -> Arc<dyn TileFetcher> {
        Arc::clone(&self.fetcher)
    }

    /// The shared engine metrics.
    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Empties the shared memory tier. Idempotent.
    pub fn clear_cache(&self) {
        self.memory.clear();
    }

    /// Clears the memory tier and stops the fetch pool. Terminal; call at
    /// process teardown.
    pub fn shutdown(&self) {
        self.memory.clear();
        self.pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::coord::TileCoord;
    use crate::fetch::MockFetcher;

    #[tokio::test]
    async fn test_defaults() {
        let config = SharedServicesConfig::default();
        assert_eq!(config.memory_capacity, 50);
        assert_eq!(config.max_concurrent_requests, 4);
    }

    #[tokio::test]
    async fn test_construction_and_accessors() {
        let services = SharedServices::with_fetcher(
            SharedServicesConfig::default(),
            Arc::new(MockFetcher::ok(b"tile")),
        );

        assert_eq!(services.memory().capacity(), 50);
        assert_eq!(services.pool().limit(), 4);
        assert_eq!(services.metrics().snapshot().memory_hits, 0);
        services.shutdown();
    }

    #[tokio::test]
    async fn test_clear_cache_empties_memory_tier() {
        let services = SharedServices::with_fetcher(
            SharedServicesConfig::default(),
            Arc::new(MockFetcher::ok(b"tile")),
        );

        let key = CacheKey::for_tile("t", TileCoord::new(1, 2, 3));
        services.memory().put(key.clone(), Bytes::from_static(b"x"));
        assert!(services.memory().contains(&key));

        services.clear_cache();
        assert!(services.memory().is_empty());
        services.shutdown();
    }
}
