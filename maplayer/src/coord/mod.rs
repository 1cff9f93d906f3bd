//! Tile coordinate types
//!
//! Provides the [`TileCoord`] value type identifying one cell of the map
//! engine's zoom-level grid, and neighbor-ring iteration used by the preload
//! scheduler.

use std::fmt;

/// Identifies a tile in the map engine's tiling scheme.
///
/// A tile coordinate is the `(x, y, zoom)` triple addressing one cell of the
/// grid at a zoom level. At zoom `z` the valid range for both axes is
/// `0..2^z`.
///
/// # Example
///
/// ```
/// use maplayer::coord::TileCoord;
///
/// let coord = TileCoord::new(3, 5, 7);
/// assert_eq!(coord.x, 3);
/// assert_eq!(coord.y, 5);
/// assert_eq!(coord.zoom, 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Column (increases eastward).
    pub x: u32,
    /// Row (increases southward).
    pub y: u32,
    /// Zoom level.
    pub zoom: u8,
}

impl TileCoord {
    /// Create a new tile coordinate.
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Number of tiles along one axis at this coordinate's zoom level.
    ///
    /// Saturates at `u32::MAX` for zoom levels of 32 and above, which are
    /// outside any real tiling scheme.
    pub fn grid_size(&self) -> u32 {
        1u32.checked_shl(self.zoom as u32).unwrap_or(u32::MAX)
    }

    /// Whether this coordinate lies inside the grid of its zoom level.
    pub fn in_grid(&self) -> bool {
        self.x < self.grid_size() && self.y < self.grid_size()
    }

    /// Iterates the neighbors within `margin` tiles (Chebyshev distance
    /// `1..=margin`) at the same zoom level.
    ///
    /// The origin tile itself is excluded, as are coordinates falling outside
    /// the zoom level's grid. A margin of 0 yields nothing.
    pub fn neighbors_within(&self, margin: u32) -> impl Iterator<Item = TileCoord> + '_ {
        let origin = *self;
        let grid = self.grid_size() as i64;
        let m = margin as i64;
        let (cx, cy) = (self.x as i64, self.y as i64);

        (cy - m..=cy + m)
            .flat_map(move |y| (cx - m..=cx + m).map(move |x| (x, y)))
            .filter(move |&(x, y)| x >= 0 && y >= 0 && x < grid && y < grid)
            .map(move |(x, y)| TileCoord::new(x as u32, y as u32, origin.zoom))
            .filter(move |c| *c != origin)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let coord = TileCoord::new(100, 200, 15);
        assert_eq!(coord.x, 100);
        assert_eq!(coord.y, 200);
        assert_eq!(coord.zoom, 15);
    }

    #[test]
    fn test_equality_and_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(TileCoord::new(1, 2, 3));
        set.insert(TileCoord::new(1, 2, 3));
        set.insert(TileCoord::new(1, 2, 4));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_grid_size() {
        assert_eq!(TileCoord::new(0, 0, 0).grid_size(), 1);
        assert_eq!(TileCoord::new(0, 0, 5).grid_size(), 32);
        assert_eq!(TileCoord::new(0, 0, 20).grid_size(), 1 << 20);
    }

    #[test]
    fn test_in_grid() {
        assert!(TileCoord::new(31, 31, 5).in_grid());
        assert!(!TileCoord::new(32, 0, 5).in_grid());
        assert!(!TileCoord::new(0, 32, 5).in_grid());
    }

    #[test]
    fn test_neighbors_margin_one_interior() {
        // Interior tile: all 8 neighbors at Chebyshev distance 1.
        let origin = TileCoord::new(2, 2, 5);
        let neighbors: Vec<_> = origin.neighbors_within(1).collect();

        assert_eq!(neighbors.len(), 8);
        assert!(!neighbors.contains(&origin));
        for n in &neighbors {
            assert_eq!(n.zoom, 5);
            let dx = (n.x as i64 - 2).unsigned_abs();
            let dy = (n.y as i64 - 2).unsigned_abs();
            assert_eq!(dx.max(dy), 1);
        }
    }

    #[test]
    fn test_neighbors_margin_zero_is_empty() {
        let origin = TileCoord::new(2, 2, 5);
        assert_eq!(origin.neighbors_within(0).count(), 0);
    }

    #[test]
    fn test_neighbors_clamped_at_corner() {
        // Corner tile (0,0): only the 3 in-grid neighbors remain.
        let origin = TileCoord::new(0, 0, 5);
        let neighbors: Vec<_> = origin.neighbors_within(1).collect();

        assert_eq!(neighbors.len(), 3);
        assert!(neighbors.contains(&TileCoord::new(1, 0, 5)));
        assert!(neighbors.contains(&TileCoord::new(0, 1, 5)));
        assert!(neighbors.contains(&TileCoord::new(1, 1, 5)));
    }

    #[test]
    fn test_neighbors_clamped_at_far_edge() {
        // At zoom 1 the grid is 2x2; tile (1,1) sits in the far corner.
        let origin = TileCoord::new(1, 1, 1);
        let neighbors: Vec<_> = origin.neighbors_within(1).collect();

        assert_eq!(neighbors.len(), 3);
        for n in &neighbors {
            assert!(n.in_grid());
        }
    }

    #[test]
    fn test_neighbors_margin_two() {
        // 5x5 block minus the origin.
        let origin = TileCoord::new(10, 10, 10);
        assert_eq!(origin.neighbors_within(2).count(), 24);
    }

    #[test]
    fn test_display() {
        assert_eq!(TileCoord::new(3, 5, 7).to_string(), "7/3/5");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_neighbors_exclude_origin_and_stay_in_ring(
                x in 0u32..1024,
                y in 0u32..1024,
                zoom in 10u8..=18,
                margin in 0u32..4
            ) {
                let origin = TileCoord::new(x, y, zoom);
                for n in origin.neighbors_within(margin) {
                    prop_assert!(n != origin);
                    prop_assert_eq!(n.zoom, zoom);
                    prop_assert!(n.in_grid());
                    let dx = (n.x as i64 - x as i64).unsigned_abs();
                    let dy = (n.y as i64 - y as i64).unsigned_abs();
                    prop_assert!(dx.max(dy) <= margin as u64);
                    prop_assert!(dx.max(dy) >= 1);
                }
            }

            #[test]
            fn test_neighbors_count_for_interior_tiles(
                x in 8u32..1000,
                y in 8u32..1000,
                zoom in 12u8..=18,
                margin in 1u32..4
            ) {
                // Tiles far from the grid edge see the full ring.
                let origin = TileCoord::new(x, y, zoom);
                let side = 2 * margin as usize + 1;
                prop_assert_eq!(
                    origin.neighbors_within(margin).count(),
                    side * side - 1
                );
            }

            #[test]
            fn test_neighbors_unique(
                x in 0u32..512,
                y in 0u32..512,
                zoom in 10u8..=14,
                margin in 1u32..4
            ) {
                let origin = TileCoord::new(x, y, zoom);
                let all: Vec<_> = origin.neighbors_within(margin).collect();
                let unique: std::collections::HashSet<_> = all.iter().copied().collect();
                prop_assert_eq!(all.len(), unique.len());
            }
        }
    }
}
