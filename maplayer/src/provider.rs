//! Per-overlay tile provider.
//!
//! The provider is the engine behind one materialized tile overlay. The map
//! renderer calls [`TileProvider::tile`] synchronously for every tile it
//! wants to draw; the call never blocks on I/O. A memory-tier hit returns
//! the bytes immediately. A miss hands one coalesced fetch job to the shared
//! pool — the worker consults the disk tier, then the network, and populates
//! every enabled tier on success — and returns [`TileStatus::Pending`] so a
//! later draw pass finds the tile cached. Alongside each viewport request
//! the surrounding preload ring is scheduled at background priority.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheKey, DiskCache};
use crate::coord::TileCoord;
use crate::fetch::Priority;
use crate::preload;
use crate::services::SharedServices;
use crate::template;

/// Outcome of a synchronous tile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileStatus {
    /// The tile was resident in the memory tier.
    Ready(Bytes),
    /// A fetch has been scheduled (or is already in flight); ask again on a
    /// later draw pass.
    Pending,
    /// The coordinate's zoom level is outside the overlay's configured range;
    /// nothing was scheduled.
    OutOfRange,
}

/// Mutable per-overlay knobs, updatable after the overlay is built.
#[derive(Debug, Clone, Copy)]
pub struct ProviderSettings {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub memory_enabled: bool,
    pub disk_enabled: bool,
    pub preload_margin: u32,
}

/// Removes the in-flight marker when the fetch job finishes or is dropped
/// while still queued, so cancelled requests cannot wedge coalescing.
struct InflightGuard {
    map: Arc<DashMap<CacheKey, ()>>,
    key: CacheKey,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

/// The engine behind one materialized tile overlay.
///
/// The URL template is fixed for the provider's lifetime; changing it
/// requires destroying and recreating the overlay.
pub struct TileProvider {
    template: Arc<str>,
    tile_width: u32,
    tile_height: u32,
    services: Arc<SharedServices>,
    disk: Option<Arc<DiskCache>>,
    settings: RwLock<ProviderSettings>,
    inflight: Arc<DashMap<CacheKey, ()>>,
    /// Parent token for every request this overlay submits; cancelled on
    /// overlay removal.
    cancel: CancellationToken,
}

impl TileProvider {
    /// Wires a provider from its frozen template, tile dimensions, initial
    /// settings and the shared services.
    pub fn new(
        template: &str,
        tile_width: u32,
        tile_height: u32,
        settings: ProviderSettings,
        services: Arc<SharedServices>,
        disk: Option<Arc<DiskCache>>,
    ) -> Self {
        Self {
            template: Arc::from(template),
            tile_width,
            tile_height,
            services,
            disk,
            settings: RwLock::new(settings),
            inflight: Arc::new(DashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// The frozen URL template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Tile pixel dimensions handed to the renderer.
    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    /// Copy of the current mutable settings.
    pub fn settings(&self) -> ProviderSettings {
        *self.settings.read()
    }

    /// Applies a settings change; takes effect on the next tile request.
    pub fn apply_settings(&self, apply: impl FnOnce(&mut ProviderSettings)) {
        apply(&mut self.settings.write());
    }

    /// The disk tier, when one was opened for this overlay.
    pub fn disk(&self) -> Option<&Arc<DiskCache>> {
        self.disk.as_ref()
    }

    /// Number of requests currently in flight or queued for this overlay.
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    /// Cancels every queued and in-flight request of this overlay.
    /// Queued requests are dropped without consuming a pool slot; running
    /// fetches are cancelled best-effort. Called on overlay removal.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    /// Synchronous tile lookup for the renderer.
    ///
    /// Never blocks on I/O: returns the memory-resident bytes, or schedules
    /// an asynchronous fetch (plus the preload ring) and reports
    /// [`TileStatus::Pending`].
    pub fn tile(&self, coord: TileCoord) -> TileStatus {
        let settings = self.settings();
        if coord.zoom < settings.min_zoom || coord.zoom > settings.max_zoom {
            return TileStatus::OutOfRange;
        }

        let key = CacheKey::for_tile(&self.template, coord);
        if settings.memory_enabled {
            if let Some(bytes) = self.services.memory().get(&key) {
                self.services.metrics().memory_hit();
                return TileStatus::Ready(bytes);
            }
            self.services.metrics().memory_miss();
        }

        self.spawn_fetch(coord, key, Priority::Viewport, settings);
        self.schedule_preload(coord, settings);
        TileStatus::Pending
    }

    /// Submits one coalesced fetch job for the tile. A coordinate already
    /// queued or in flight is not submitted again.
    fn spawn_fetch(
        &self,
        coord: TileCoord,
        key: CacheKey,
        priority: Priority,
        settings: ProviderSettings,
    ) {
        use dashmap::mapref::entry::Entry;
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(_) => return,
            Entry::Vacant(vacant) => {
                vacant.insert(());
            }
        }

        let guard = InflightGuard {
            map: Arc::clone(&self.inflight),
            key: key.clone(),
        };
        let template = Arc::clone(&self.template);
        let services = Arc::clone(&self.services);
        let disk = settings.disk_enabled.then(|| self.disk.clone()).flatten();
        let memory_enabled = settings.memory_enabled;
        let token = self.cancel.child_token();

        debug!(tile = %coord, ?priority, "scheduling tile fetch");
        self.services.pool().submit_with_token(
            priority,
            token,
            Box::pin(async move {
                let _guard = guard;
                fetch_tile(coord, key, template, services, disk, memory_enabled).await;
            }),
        );
    }

    /// Schedules the preload ring around a viewport tile. Only enqueues;
    /// memory residency is checked here, disk residency inside the worker.
    fn schedule_preload(&self, origin: TileCoord, settings: ProviderSettings) {
        if settings.preload_margin == 0 {
            return;
        }
        let ring = preload::plan_ring(origin, settings.preload_margin, |coord| {
            settings.memory_enabled
                && self
                    .services
                    .memory()
                    .contains(&CacheKey::for_tile(&self.template, coord))
        });
        if ring.is_empty() {
            return;
        }

        self.services.metrics().preloads_scheduled(ring.len() as u64);
        for coord in ring {
            let key = CacheKey::for_tile(&self.template, coord);
            self.spawn_fetch(coord, key, Priority::Preload, settings);
        }
    }
}

/// The worker half of a tile request: disk tier, then network, populating
/// every enabled tier on success. Any failure degrades to a miss.
async fn fetch_tile(
    coord: TileCoord,
    key: CacheKey,
    template: Arc<str>,
    services: Arc<SharedServices>,
    disk: Option<Arc<DiskCache>>,
    memory_enabled: bool,
) {
    let metrics = services.metrics();

    if let Some(disk) = &disk {
        match disk.get(&key).await {
            Ok(Some(bytes)) => {
                metrics.disk_hit();
                if memory_enabled {
                    services.memory().put(key, bytes);
                }
                return;
            }
            Ok(None) => metrics.disk_miss(),
            Err(e) => warn!(tile = %coord, error = %e, "disk cache read failed"),
        }
    }

    let url = match template::resolve(&template, coord) {
        Ok(url) => url,
        Err(e) => {
            warn!(tile = %coord, error = %e, "dropping tile request: bad URL template");
            return;
        }
    };

    metrics.fetch_started();
    match services.fetcher().fetch(url).await {
        Ok(bytes) => {
            metrics.fetch_succeeded();
            if memory_enabled {
                services.memory().put(key.clone(), bytes.clone());
            }
            if let Some(disk) = &disk {
                if let Err(e) = disk.put(&key, bytes).await {
                    warn!(tile = %coord, error = %e, "disk cache write failed");
                }
            }
        }
        Err(e) => {
            metrics.fetch_failed();
            warn!(tile = %coord, error = %e, "tile fetch failed");
        }
    }
}
