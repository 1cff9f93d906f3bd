//! Overlay registry and command surface.
//!
//! Holds every live overlay by id and serves the add/update/remove commands
//! the dispatch collaborator decodes from the method channel. Commands are
//! idempotent with respect to unknown ids: updating or removing an id that
//! was never added (or was already removed) is silently ignored.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::warn;

use crate::cache::DiskCache;
use crate::overlay::controller::TileOverlay;
use crate::overlay::options::{TileOverlayOptions, DEFAULT_DISK_CACHE_MB};
use crate::services::SharedServices;

/// Registry of live tile overlays sharing one set of services and one disk
/// store.
pub struct TileOverlayRegistry {
    services: Arc<SharedServices>,
    disk: Option<Arc<DiskCache>>,
    overlays: DashMap<String, Arc<TileOverlay>>,
}

impl TileOverlayRegistry {
    /// Creates a registry, opening the shared disk store under the
    /// configured root (or the documented fallback; see
    /// [`DiskCache::resolve_root`]). A store that cannot be opened degrades
    /// to a disabled disk tier with a warning, never an error.
    pub async fn new(services: Arc<SharedServices>, disk_root: Option<PathBuf>) -> Self {
        let disk = match DiskCache::resolve_root(disk_root) {
            Some(root) => {
                let budget = DEFAULT_DISK_CACHE_MB as u64 * 1024 * 1024;
                match DiskCache::open(root, budget).await {
                    Ok(disk) => Some(Arc::new(disk)),
                    Err(e) => {
                        warn!(error = %e, "disk cache unavailable, disk tier disabled");
                        None
                    }
                }
            }
            None => None,
        };
        Self::with_disk(services, disk)
    }

    /// Creates a registry over an already-opened (or absent) disk store.
    pub fn with_disk(services: Arc<SharedServices>, disk: Option<Arc<DiskCache>>) -> Self {
        Self {
            services,
            disk,
            overlays: DashMap::new(),
        }
    }

    /// Builds one overlay per config payload and returns the ids of those
    /// added. Payloads without an id, or without a URL template, are skipped
    /// with a warning.
    pub fn add_overlays(&self, configs: &[Value]) -> Vec<String> {
        let mut added = Vec::new();
        for config in configs {
            let (id, options) = TileOverlayOptions::decode(config);
            let Some(id) = id else {
                warn!("skipping tile overlay config without id");
                continue;
            };
            match TileOverlay::build(
                id.clone(),
                options,
                Arc::clone(&self.services),
                self.disk.clone(),
            ) {
                Ok(overlay) => {
                    self.overlays.insert(id.clone(), Arc::new(overlay));
                    added.push(id);
                }
                Err(e) => warn!(overlay = %id, error = %e, "skipping tile overlay"),
            }
        }
        added
    }

    /// Applies partial config payloads by id. Unknown ids are ignored.
    pub async fn update_overlays(&self, patches: &[Value]) {
        for patch in patches {
            let Some(id) = patch.get("id").and_then(Value::as_str) else {
                continue;
            };
            let overlay = self.overlays.get(id).map(|o| Arc::clone(o.value()));
            if let Some(overlay) = overlay {
                overlay.update(patch).await;
            }
        }
    }

    /// Removes overlays by id, cancelling their outstanding requests.
    /// Unknown ids are ignored.
    pub fn remove_overlays(&self, ids: &[String]) {
        for id in ids {
            if let Some((_, overlay)) = self.overlays.remove(id) {
                overlay.remove();
            }
        }
    }

    /// Handles one batched overlay-update call in the wire shape of the
    /// dispatch layer: `tileOverlaysToAdd`, `tileOverlaysToChange` and
    /// `tileOverlayIdsToRemove` lists, each optional. Returns the ids of
    /// the overlays added.
    pub async fn apply_batch(&self, args: &Value) -> Vec<String> {
        let added = match args.get("tileOverlaysToAdd").and_then(Value::as_array) {
            Some(configs) => self.add_overlays(configs),
            None => Vec::new(),
        };
        if let Some(patches) = args.get("tileOverlaysToChange").and_then(Value::as_array) {
            self.update_overlays(patches).await;
        }
        if let Some(ids) = args.get("tileOverlayIdsToRemove").and_then(Value::as_array) {
            let ids: Vec<String> = ids
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            self.remove_overlays(&ids);
        }
        added
    }

    /// Looks up a live overlay by id.
    pub fn get(&self, id: &str) -> Option<Arc<TileOverlay>> {
        self.overlays.get(id).map(|o| Arc::clone(o.value()))
    }

    /// Number of live overlays.
    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    /// Whether no overlays are live.
    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// The shared disk store, when one is open.
    pub fn disk(&self) -> Option<&Arc<DiskCache>> {
        self.disk.as_ref()
    }
}
