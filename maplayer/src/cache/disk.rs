//! On-disk cache tier with a soft size budget.
//!
//! Entries are stored one file per [`CacheKey`] under a caller-supplied root
//! directory, named by the SHA-256 hex of the key. The store enforces a soft
//! byte budget: when an insertion would exceed it, entries are evicted
//! oldest-by-last-access until the new entry fits. Last access is tracked via
//! the file modification time, which `get` bumps on every hit.
//!
//! All I/O goes through `tokio::fs` and may block on the filesystem; callers
//! reach this tier only from fetch-pool workers, never from the synchronous
//! tile-request path. The store survives process restarts.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::key::CacheKey;

/// File extension for cache entries.
const ENTRY_EXT: &str = "tile";

/// Errors produced by disk cache operations.
#[derive(Debug, Error)]
pub enum DiskCacheError {
    /// I/O error while reading or writing the store.
    #[error("disk cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Size-budgeted persistent tile store.
///
/// Multiple overlays configured with the same root directory share entries.
/// Writes and evictions are serialized internally; reads are concurrent.
pub struct DiskCache {
    root: PathBuf,
    budget_bytes: AtomicU64,
    size_bytes: AtomicU64,
    entries: AtomicU64,
    /// Serializes put/evict/clear so budget accounting stays consistent.
    write_lock: Mutex<()>,
}

impl DiskCache {
    /// Open (or create) a store rooted at `root` with the given byte budget.
    ///
    /// Scans the directory to rebuild size accounting, so entries written by
    /// a previous process remain visible.
    pub async fn open(root: PathBuf, budget_bytes: u64) -> Result<Self, DiskCacheError> {
        tokio::fs::create_dir_all(&root).await?;

        let mut size = 0u64;
        let mut count = 0u64;
        let mut dir = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.path().extension().is_some_and(|e| e == ENTRY_EXT) {
                size += entry.metadata().await?.len();
                count += 1;
            }
        }

        debug!(
            root = %root.display(),
            entries = count,
            size_bytes = size,
            "opened disk tile cache"
        );

        Ok(Self {
            root,
            budget_bytes: AtomicU64::new(budget_bytes),
            size_bytes: AtomicU64::new(size),
            entries: AtomicU64::new(count),
            write_lock: Mutex::new(()),
        })
    }

    /// Resolve the storage root from an optional configured directory.
    ///
    /// Falls back to the platform cache directory when none is supplied;
    /// returns `None` (disk tier disabled) when no usable location exists.
    /// A hard-coded absolute fallback path is deliberately avoided.
    pub fn resolve_root(configured: Option<PathBuf>) -> Option<PathBuf> {
        if let Some(dir) = configured {
            return Some(dir);
        }
        match dirs::cache_dir() {
            Some(base) => {
                let fallback = base.join("maplayer").join("tiles");
                warn!(
                    path = %fallback.display(),
                    "no disk cache directory configured, using platform cache dir"
                );
                Some(fallback)
            }
            None => {
                warn!("no disk cache directory configured and no platform cache dir; disk tier disabled");
                None
            }
        }
    }

    /// Look up a tile, bumping its last-access time on a hit.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, DiskCacheError> {
        let path = self.entry_path(key);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                touch(&path);
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether an entry exists for the key. Does not update last access.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        tokio::fs::metadata(self.entry_path(key)).await.is_ok()
    }

    /// Store a tile, evicting oldest-access entries until it fits the budget.
    ///
    /// The budget is soft: an entry larger than the whole budget is still
    /// written after everything else has been evicted.
    pub async fn put(&self, key: &CacheKey, data: Bytes) -> Result<(), DiskCacheError> {
        let _guard = self.write_lock.lock().await;

        let path = self.entry_path(key);
        let replaced = match tokio::fs::metadata(&path).await {
            Ok(meta) => Some(meta.len()),
            Err(_) => None,
        };

        let needed = data.len() as u64;
        let budget = self.budget_bytes.load(Ordering::Relaxed);
        // Target size for the store *before* the write, keeping the entry
        // being replaced out of the eviction sweep.
        let target = budget.saturating_sub(needed) + replaced.unwrap_or(0);
        self.evict_until(target, &path).await?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &path).await?;

        if let Some(old) = replaced {
            self.size_bytes.fetch_sub(old, Ordering::Relaxed);
        } else {
            self.entries.fetch_add(1, Ordering::Relaxed);
        }
        self.size_bytes.fetch_add(needed, Ordering::Relaxed);
        Ok(())
    }

    /// Remove every entry. Idempotent.
    pub async fn clear(&self) -> Result<(), DiskCacheError> {
        let _guard = self.write_lock.lock().await;

        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;

        self.size_bytes.store(0, Ordering::Relaxed);
        self.entries.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Current store size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes.load(Ordering::Relaxed)
    }

    /// Current number of entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    /// The configured byte budget.
    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes.load(Ordering::Relaxed)
    }

    /// Replace the byte budget. Applies to subsequent insertions.
    pub fn set_budget(&self, budget_bytes: u64) {
        self.budget_bytes.store(budget_bytes, Ordering::Relaxed);
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        self.root.join(format!("{:x}.{}", digest, ENTRY_EXT))
    }

    /// Evicts oldest-by-mtime entries until the store size drops to `target`.
    /// `keep` is never evicted (it is the entry about to be replaced).
    async fn evict_until(&self, target: u64, keep: &Path) -> Result<(), DiskCacheError> {
        if self.size_bytes.load(Ordering::Relaxed) <= target {
            return Ok(());
        }

        let mut candidates = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path == keep || !path.extension().is_some_and(|e| e == ENTRY_EXT) {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                candidates.push((path, mtime, meta.len()));
            }
        }
        candidates.sort_by_key(|(_, mtime, _)| *mtime);

        for (path, _, len) in candidates {
            if self.size_bytes.load(Ordering::Relaxed) <= target {
                break;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    self.size_bytes.fetch_sub(len, Ordering::Relaxed);
                    self.entries.fetch_sub(1, Ordering::Relaxed);
                    debug!(path = %path.display(), "evicted disk cache entry");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "disk cache eviction failed"),
            }
        }
        Ok(())
    }
}

/// Best-effort bump of a file's modification time to now.
///
/// Mtime doubles as the last-access stamp for eviction ordering; atime is
/// unreliable on common mount options.
fn touch(path: &Path) {
    if let Ok(file) = std::fs::OpenOptions::new().append(true).open(path) {
        let _ = file.set_modified(SystemTime::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use filetime::FileTime;
    use std::time::Duration;

    fn key(x: u32) -> CacheKey {
        CacheKey::for_tile("https://x/{z}/{x}/{y}.png", TileCoord::new(x, 0, 9))
    }

    fn age(cache: &DiskCache, k: &CacheKey, secs_ago: u64) {
        let path = cache.entry_path(k);
        let then = SystemTime::now() - Duration::from_secs(secs_ago);
        filetime::set_file_mtime(&path, FileTime::from_system_time(then)).unwrap();
    }

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().to_path_buf(), 1_000_000).await.unwrap();

        cache.put(&key(1), Bytes::from_static(b"tile-bytes")).await.unwrap();

        let got = cache.get(&key(1)).await.unwrap();
        assert_eq!(got, Some(Bytes::from_static(b"tile-bytes")));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().to_path_buf(), 1_000_000).await.unwrap();

        assert_eq!(cache.get(&key(404)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = DiskCache::open(dir.path().to_path_buf(), 1_000_000).await.unwrap();
            cache.put(&key(1), Bytes::from_static(b"persisted")).await.unwrap();
        }

        let reopened = DiskCache::open(dir.path().to_path_buf(), 1_000_000).await.unwrap();
        assert_eq!(reopened.entry_count(), 1);
        assert_eq!(reopened.size_bytes(), 9);
        assert_eq!(
            reopened.get(&key(1)).await.unwrap(),
            Some(Bytes::from_static(b"persisted"))
        );
    }

    #[tokio::test]
    async fn test_clear_removes_everything_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().to_path_buf(), 1_000_000).await.unwrap();

        cache.put(&key(1), Bytes::from_static(b"a")).await.unwrap();
        cache.put(&key(2), Bytes::from_static(b"b")).await.unwrap();

        cache.clear().await.unwrap();
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.size_bytes(), 0);
        assert_eq!(cache.get(&key(1)).await.unwrap(), None);

        cache.clear().await.unwrap();
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_replacing_entry_does_not_double_count() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().to_path_buf(), 1_000_000).await.unwrap();

        cache.put(&key(1), Bytes::from(vec![0u8; 100])).await.unwrap();
        cache.put(&key(1), Bytes::from(vec![0u8; 40])).await.unwrap();

        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.size_bytes(), 40);
    }

    #[tokio::test]
    async fn test_budget_evicts_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().to_path_buf(), 250).await.unwrap();

        cache.put(&key(1), Bytes::from(vec![1u8; 100])).await.unwrap();
        cache.put(&key(2), Bytes::from(vec![2u8; 100])).await.unwrap();
        age(&cache, &key(1), 300);
        age(&cache, &key(2), 200);

        // 100 more bytes exceed the 250-byte budget; key(1) is oldest.
        cache.put(&key(3), Bytes::from(vec![3u8; 100])).await.unwrap();

        assert_eq!(cache.get(&key(1)).await.unwrap(), None);
        assert!(cache.get(&key(2)).await.unwrap().is_some());
        assert!(cache.get(&key(3)).await.unwrap().is_some());
        assert!(cache.size_bytes() <= 250);
    }

    #[tokio::test]
    async fn test_get_refreshes_last_access() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().to_path_buf(), 250).await.unwrap();

        cache.put(&key(1), Bytes::from(vec![1u8; 100])).await.unwrap();
        cache.put(&key(2), Bytes::from(vec![2u8; 100])).await.unwrap();
        age(&cache, &key(1), 300);
        age(&cache, &key(2), 200);

        // Reading key(1) bumps its mtime, so key(2) becomes the victim.
        assert!(cache.get(&key(1)).await.unwrap().is_some());
        cache.put(&key(3), Bytes::from(vec![3u8; 100])).await.unwrap();

        assert!(cache.get(&key(1)).await.unwrap().is_some());
        assert_eq!(cache.get(&key(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_entry_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().to_path_buf(), 50).await.unwrap();

        cache.put(&key(1), Bytes::from(vec![0u8; 40])).await.unwrap();
        // Larger than the whole budget: everything else is evicted, the
        // entry itself is still stored (soft budget).
        cache.put(&key(2), Bytes::from(vec![0u8; 80])).await.unwrap();

        assert_eq!(cache.get(&key(1)).await.unwrap(), None);
        assert!(cache.get(&key(2)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_resolve_root_prefers_configured() {
        let configured = PathBuf::from("/tmp/custom-tiles");
        assert_eq!(
            DiskCache::resolve_root(Some(configured.clone())),
            Some(configured)
        );
    }

    #[tokio::test]
    async fn test_set_budget_applies_to_next_put() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().to_path_buf(), 1_000_000).await.unwrap();

        cache.put(&key(1), Bytes::from(vec![0u8; 100])).await.unwrap();
        age(&cache, &key(1), 100);
        cache.set_budget(150);
        cache.put(&key(2), Bytes::from(vec![0u8; 100])).await.unwrap();

        assert_eq!(cache.get(&key(1)).await.unwrap(), None);
        assert!(cache.get(&key(2)).await.unwrap().is_some());
    }
}
