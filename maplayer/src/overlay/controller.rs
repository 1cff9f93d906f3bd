//! Post-build tile overlay controller.
//!
//! Built from a [`TileOverlayOptions`] snapshot, a [`TileOverlay`] owns the
//! wired [`TileProvider`] and applies post-creation updates. The URL template
//! is frozen at build time: the map engine's provider cannot change its
//! source afterwards, so a template change is accepted into the inspectable
//! options copy but has no effect on served tiles — the documented remedy is
//! to remove and re-add the overlay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::DiskCache;
use crate::overlay::options::TileOverlayOptions;
use crate::provider::{ProviderSettings, TileProvider};
use crate::services::SharedServices;

/// Errors produced while building an overlay.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The configuration carries no URL template, so no tile provider can
    /// be constructed.
    #[error("tile overlay {0:?} has no URL template")]
    MissingUrlTemplate(String),
}

/// A materialized tile overlay.
///
/// State machine: built here, updated via [`update`](Self::update),
/// removed via [`remove`](Self::remove) (terminal).
pub struct TileOverlay {
    id: String,
    provider: Arc<TileProvider>,
    services: Arc<SharedServices>,
    /// Inspectable copy of the configuration, including post-build template
    /// writes that no longer affect behavior.
    options: Mutex<TileOverlayOptions>,
    removed: AtomicBool,
}

impl TileOverlay {
    /// Materializes an overlay: wires the provider to the shared services
    /// and the (optional) disk tier, freezing the URL template.
    ///
    /// The disk store is shared across overlays with the same root; the
    /// overlay's configured budget is applied to it when its disk tier is
    /// enabled.
    pub fn build(
        id: impl Into<String>,
        options: TileOverlayOptions,
        services: Arc<SharedServices>,
        disk: Option<Arc<DiskCache>>,
    ) -> Result<Self, OverlayError> {
        let id = id.into();
        let template = options
            .url_template()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OverlayError::MissingUrlTemplate(id.clone()))?;

        if options.disk_cache_enabled() {
            if let Some(disk) = &disk {
                disk.set_budget(options.disk_budget_bytes());
            }
        }

        let settings = ProviderSettings {
            min_zoom: options.min_zoom(),
            max_zoom: options.max_zoom(),
            memory_enabled: options.memory_cache_enabled(),
            disk_enabled: options.disk_cache_enabled(),
            preload_margin: options.preload_margin_tiles(),
        };
        let provider = Arc::new(TileProvider::new(
            template,
            options.tile_width(),
            options.tile_height(),
            settings,
            Arc::clone(&services),
            disk,
        ));

        info!(overlay = %id, template = provider.template(), "tile overlay built");
        Ok(Self {
            id,
            provider,
            services,
            options: Mutex::new(options),
            removed: AtomicBool::new(false),
        })
    }

    /// The overlay's id on the dispatch side.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The provider serving this overlay's tile requests.
    pub fn provider(&self) -> Arc<TileProvider> {
        Arc::clone(&self.provider)
    }

    /// Snapshot of the current (inspectable) options.
    pub fn options(&self) -> TileOverlayOptions {
        self.options.lock().clone()
    }

    /// Whether the overlay should be drawn.
    pub fn is_visible(&self) -> bool {
        self.options.lock().visible()
    }

    /// Draw order hint for the renderer.
    pub fn z_index(&self) -> f64 {
        self.options.lock().z_index()
    }

    /// Whether [`remove`](Self::remove) has been called.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    /// Applies a partial configuration payload.
    ///
    /// Mutable fields (visibility, z-index, zoom bounds, cache toggles and
    /// sizes, preload margin, concurrency cap) take effect on the next tile
    /// request. Changing a cache tier's toggle or size clears that tier so
    /// no entry inconsistent with the new policy is served. The memory tier
    /// and the fetch pool are process-wide, so their reconfiguration is
    /// visible to every overlay.
    pub async fn update(&self, patch: &Value) {
        if self.is_removed() {
            return;
        }

        let (before, after) = {
            let mut options = self.options.lock();
            let before = options.clone();
            options.merge(patch);
            (before, options.clone())
        };

        if before.url_template() != after.url_template() {
            warn!(
                overlay = %self.id,
                "URL template changes have no effect on a built overlay; remove and re-add it"
            );
        }

        self.provider.apply_settings(|settings| {
            settings.min_zoom = after.min_zoom();
            settings.max_zoom = after.max_zoom();
            settings.memory_enabled = after.memory_cache_enabled();
            settings.disk_enabled = after.disk_cache_enabled();
            settings.preload_margin = after.preload_margin_tiles();
        });

        let memory_changed = before.memory_cache_enabled() != after.memory_cache_enabled()
            || before.memory_cache_size() != after.memory_cache_size();
        if memory_changed {
            self.services.clear_cache();
            self.services
                .memory()
                .resize(after.memory_cache_capacity());
            info!(overlay = %self.id, capacity = after.memory_cache_capacity(), "memory tier reconfigured");
        }

        let disk_changed = before.disk_cache_enabled() != after.disk_cache_enabled()
            || before.disk_cache_size() != after.disk_cache_size();
        if disk_changed {
            if let Some(disk) = self.provider.disk() {
                disk.set_budget(after.disk_budget_bytes());
                if let Err(e) = disk.clear().await {
                    warn!(overlay = %self.id, error = %e, "disk tier clear failed");
                }
            }
        }

        if before.max_concurrent_requests() != after.max_concurrent_requests() {
            self.services.pool().set_limit(after.concurrency_limit());
        }
    }

    /// Tears the overlay down: cancels its queued and in-flight requests.
    /// Terminal and idempotent. The shared cache tiers are left intact for
    /// the overlays that remain.
    pub fn remove(&self) {
        if !self.removed.swap(true, Ordering::SeqCst) {
            self.provider.cancel_all();
            info!(overlay = %self.id, "tile overlay removed");
        }
    }
}
