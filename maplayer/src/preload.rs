//! Speculative tile preloading.
//!
//! When the renderer requests a tile, the surrounding ring within the
//! configured margin is warmed at background priority, so panning the map a
//! little finds the neighbors already cached. Planning is pure and cheap;
//! the provider submits the resulting coordinates to the fetch pool, so
//! scheduling never blocks the request path.

use crate::coord::TileCoord;

/// Plans the preload ring around a viewport tile.
///
/// Returns the coordinates at Chebyshev distance `1..=margin` from `origin`
/// at the same zoom level, clamped to the zoom's grid, excluding the origin
/// itself and any coordinate for which `is_resident` returns true (already
/// in the memory tier; disk residency is re-checked inside the worker). A
/// margin of zero disables preloading.
pub fn plan_ring(
    origin: TileCoord,
    margin: u32,
    mut is_resident: impl FnMut(TileCoord) -> bool,
) -> Vec<TileCoord> {
    if margin == 0 {
        return Vec::new();
    }
    origin
        .neighbors_within(margin)
        .filter(|c| !is_resident(*c))
        .collect()
}
