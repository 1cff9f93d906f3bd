//! Tile overlay option set.
//!
//! The full recognized-option surface of a tile overlay, with the sink-style
//! setters the dispatch layer drives and a lenient JSON decoder for the
//! payloads crossing the method channel: unknown keys are ignored (forward
//! compatibility) and a known key carrying an unexpected type is skipped
//! field-wise rather than failing the whole payload.

use serde_json::Value;

use crate::cache::DEFAULT_MEMORY_ENTRIES;
use crate::fetch::DEFAULT_CONCURRENT_REQUESTS;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default zoom range in which an overlay renders.
pub const DEFAULT_MIN_ZOOM: u8 = 3;
pub const DEFAULT_MAX_ZOOM: u8 = 20;

/// Default disk budget in megabytes.
pub const DEFAULT_DISK_CACHE_MB: i64 = 100;

/// Default preload ring radius in tiles.
pub const DEFAULT_PRELOAD_MARGIN: i64 = 1;

/// The full option set of a tile overlay.
///
/// Mutable until the overlay is built; afterwards the URL template is frozen
/// and only the remaining fields take effect (see
/// [`TileOverlay::update`](crate::overlay::TileOverlay::update)).
///
/// Sizes are kept as configured, including out-of-range values; the
/// `*_capacity`/`*_budget`/`*_limit` accessors apply the documented
/// fallbacks (a size of zero or below falls back to its default).
#[derive(Debug, Clone, PartialEq)]
pub struct TileOverlayOptions {
    url_template: Option<String>,
    tile_width: u32,
    tile_height: u32,
    visible: bool,
    transparency: f64,
    z_index: f64,
    min_zoom: u8,
    max_zoom: u8,
    disk_cache_enabled: bool,
    disk_cache_size_mb: i64,
    memory_cache_enabled: bool,
    memory_cache_size: i64,
    preload_margin: i64,
    max_concurrent_requests: i64,
}

impl Default for TileOverlayOptions {
    fn default() -> Self {
        Self {
            url_template: None,
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            visible: true,
            transparency: 0.0,
            z_index: 0.0,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            disk_cache_enabled: true,
            disk_cache_size_mb: DEFAULT_DISK_CACHE_MB,
            memory_cache_enabled: true,
            memory_cache_size: DEFAULT_MEMORY_ENTRIES as i64,
            preload_margin: DEFAULT_PRELOAD_MARGIN,
            max_concurrent_requests: DEFAULT_CONCURRENT_REQUESTS as i64,
        }
    }
}

impl TileOverlayOptions {
    /// Creates the default option set.
    pub fn new() -> Self {
        Self::default()
    }

    // Sink-style setters, driven by the dispatch layer and by the decoder.

    pub fn set_url_template(&mut self, template: impl Into<String>) {
        self.url_template = Some(template.into());
    }

    pub fn set_tile_width(&mut self, width: u32) {
        self.tile_width = width;
    }

    pub fn set_tile_height(&mut self, height: u32) {
        self.tile_height = height;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_transparency(&mut self, transparency: f64) {
        self.transparency = transparency;
    }

    pub fn set_z_index(&mut self, z_index: f64) {
        self.z_index = z_index;
    }

    pub fn set_min_zoom(&mut self, min_zoom: u8) {
        self.min_zoom = min_zoom;
    }

    pub fn set_max_zoom(&mut self, max_zoom: u8) {
        self.max_zoom = max_zoom;
    }

    pub fn set_disk_cache_enabled(&mut self, enabled: bool) {
        self.disk_cache_enabled = enabled;
    }

    pub fn set_disk_cache_size(&mut self, megabytes: i64) {
        self.disk_cache_size_mb = megabytes;
    }

    pub fn set_memory_cache_enabled(&mut self, enabled: bool) {
        self.memory_cache_enabled = enabled;
    }

    pub fn set_memory_cache_size(&mut self, entries: i64) {
        self.memory_cache_size = entries;
    }

    pub fn set_preload_margin(&mut self, margin: i64) {
        self.preload_margin = margin;
    }

    pub fn set_max_concurrent_requests(&mut self, count: i64) {
        self.max_concurrent_requests = count;
    }

    // Raw accessors.

    pub fn url_template(&self) -> Option<&str> {
        self.url_template.as_deref()
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn transparency(&self) -> f64 {
        self.transparency
    }

    pub fn z_index(&self) -> f64 {
        self.z_index
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn disk_cache_enabled(&self) -> bool {
        self.disk_cache_enabled
    }

    pub fn disk_cache_size(&self) -> i64 {
        self.disk_cache_size_mb
    }

    pub fn memory_cache_enabled(&self) -> bool {
        self.memory_cache_enabled
    }

    pub fn memory_cache_size(&self) -> i64 {
        self.memory_cache_size
    }

    pub fn preload_margin(&self) -> i64 {
        self.preload_margin
    }

    pub fn max_concurrent_requests(&self) -> i64 {
        self.max_concurrent_requests
    }

    // Normalized accessors applying the documented fallbacks.

    /// Memory tier capacity in entries; a configured size of zero or below
    /// falls back to [`DEFAULT_MEMORY_ENTRIES`].
    pub fn memory_cache_capacity(&self) -> usize {
        if self.memory_cache_size > 0 {
            self.memory_cache_size as usize
        } else {
            DEFAULT_MEMORY_ENTRIES
        }
    }

    /// Disk budget in bytes; a configured size of zero or below falls back
    /// to [`DEFAULT_DISK_CACHE_MB`].
    pub fn disk_budget_bytes(&self) -> u64 {
        let megabytes = if self.disk_cache_size_mb > 0 {
            self.disk_cache_size_mb as u64
        } else {
            DEFAULT_DISK_CACHE_MB as u64
        };
        megabytes * 1024 * 1024
    }

    /// Pool concurrency limit; a configured count of zero or below falls
    /// back to [`DEFAULT_CONCURRENT_REQUESTS`].
    pub fn concurrency_limit(&self) -> usize {
        if self.max_concurrent_requests > 0 {
            self.max_concurrent_requests as usize
        } else {
            DEFAULT_CONCURRENT_REQUESTS
        }
    }

    /// Preload ring radius in tiles; negative values disable preloading.
    pub fn preload_margin_tiles(&self) -> u32 {
        self.preload_margin.max(0) as u32
    }

    /// Decodes a full overlay payload, returning its id (if present) and
    /// the decoded options.
    pub fn decode(value: &Value) -> (Option<String>, Self) {
        let mut options = Self::default();
        let id = options.merge(value);
        (id, options)
    }

    /// Merges the keys present in `value` into these options and returns
    /// the payload's `id`, if any.
    ///
    /// Follows the wire shape of the bridge: `urlTemplate`, `tileWidth` and
    /// `tileHeight` live in a nested `tileProvider` object, everything else
    /// at the top level. Unknown keys and type-mismatched values are
    /// ignored.
    pub fn merge(&mut self, value: &Value) -> Option<String> {
        let data = value.as_object()?;

        if let Some(provider) = data.get("tileProvider").and_then(Value::as_object) {
            if let Some(template) = provider.get("urlTemplate").and_then(Value::as_str) {
                self.set_url_template(template);
            }
            if let Some(width) = provider.get("tileWidth").and_then(as_u32) {
                self.set_tile_width(width);
            }
            if let Some(height) = provider.get("tileHeight").and_then(as_u32) {
                self.set_tile_height(height);
            }
        }

        if let Some(visible) = data.get("visible").and_then(Value::as_bool) {
            self.set_visible(visible);
        }
        if let Some(transparency) = data.get("transparency").and_then(Value::as_f64) {
            self.set_transparency(transparency);
        }
        if let Some(z_index) = data.get("zIndex").and_then(Value::as_f64) {
            self.set_z_index(z_index);
        }
        if let Some(min_zoom) = data.get("minZoom").and_then(as_zoom) {
            self.set_min_zoom(min_zoom);
        }
        if let Some(max_zoom) = data.get("maxZoom").and_then(as_zoom) {
            self.set_max_zoom(max_zoom);
        }
        if let Some(enabled) = data.get("diskCacheEnabled").and_then(Value::as_bool) {
            self.set_disk_cache_enabled(enabled);
        }
        if let Some(size) = data.get("diskCacheSize").and_then(Value::as_i64) {
            self.set_disk_cache_size(size);
        }
        if let Some(enabled) = data.get("memoryCacheEnabled").and_then(Value::as_bool) {
            self.set_memory_cache_enabled(enabled);
        }
        if let Some(size) = data.get("memoryCacheSize").and_then(Value::as_i64) {
            self.set_memory_cache_size(size);
        }
        if let Some(margin) = data.get("preloadMargin").and_then(Value::as_i64) {
            self.set_preload_margin(margin);
        }
        if let Some(count) = data.get("maxConcurrentRequests").and_then(Value::as_i64) {
            self.set_max_concurrent_requests(count);
        }

        data.get("id").and_then(Value::as_str).map(str::to_string)
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}

fn as_zoom(value: &Value) -> Option<u8> {
    value.as_i64().map(|v| v.clamp(0, 30) as u8)
}
