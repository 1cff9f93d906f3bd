//! Cache key derivation.
//!
//! Both cache tiers are keyed by a string derived from the URL template and
//! tile coordinate, in the format `{template}_{zoom}_{x}_{y}`.
//!
//! The format is injective: the three numeric fields never contain `_` and
//! always occupy the last three `_`-separated segments, so splitting from the
//! right recovers `(template, zoom, x, y)` uniquely even when the template
//! itself contains underscores or digits.

use std::fmt;

use crate::coord::TileCoord;

/// Deterministic cache key for one tile of one tile source.
///
/// Equal `(template, coordinate)` pairs always yield an equal key; distinct
/// pairs never collide. Keys are human-readable for debuggability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a tile of the given template.
    pub fn for_tile(template: &str, coord: TileCoord) -> Self {
        Self(format!(
            "{}_{}_{}_{}",
            template, coord.zoom, coord.x, coord.y
        ))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let key = CacheKey::for_tile("https://x/{z}/{x}/{y}.png", TileCoord::new(3, 5, 7));
        assert_eq!(key.as_str(), "https://x/{z}/{x}/{y}.png_7_3_5");
    }

    #[test]
    fn test_equal_inputs_equal_keys() {
        let a = CacheKey::for_tile("t", TileCoord::new(1, 2, 3));
        let b = CacheKey::for_tile("t", TileCoord::new(1, 2, 3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_coordinates_distinct_keys() {
        let template = "https://x/{z}/{x}/{y}.png";
        let a = CacheKey::for_tile(template, TileCoord::new(1, 2, 3));
        let b = CacheKey::for_tile(template, TileCoord::new(2, 1, 3));
        let c = CacheKey::for_tile(template, TileCoord::new(1, 2, 4));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_underscored_template_does_not_collide() {
        // "a_1" + (3,4,zoom 2) and "a" + would-be-ambiguous numerics decode
        // differently because the numeric fields are taken from the right.
        let a = CacheKey::for_tile("a_1", TileCoord::new(3, 4, 2));
        let b = CacheKey::for_tile("a", TileCoord::new(2, 3, 1));
        assert_ne!(a, b);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        /// Decodes a key back into `(template, zoom, x, y)` by splitting the
        /// three numeric fields from the right.
        fn decode(key: &str) -> Option<(String, u8, u32, u32)> {
            let mut parts = key.rsplitn(4, '_');
            let y = parts.next()?.parse().ok()?;
            let x = parts.next()?.parse().ok()?;
            let zoom = parts.next()?.parse().ok()?;
            let template = parts.next()?.to_string();
            Some((template, zoom, x, y))
        }

        proptest! {
            #[test]
            fn test_key_roundtrips_through_decode(
                template in "[a-z0-9_{}/:.]{1,40}",
                x in 0u32..1_000_000,
                y in 0u32..1_000_000,
                zoom in 0u8..=22
            ) {
                let key = CacheKey::for_tile(&template, TileCoord::new(x, y, zoom));
                let decoded = decode(key.as_str());
                prop_assert_eq!(decoded, Some((template, zoom, x, y)));
            }

            #[test]
            fn test_collision_freedom_within_template(
                template in "[a-z0-9_/:.]{1,30}",
                a in (0u32..10_000, 0u32..10_000, 0u8..=22),
                b in (0u32..10_000, 0u32..10_000, 0u8..=22)
            ) {
                let ca = TileCoord::new(a.0, a.1, a.2);
                let cb = TileCoord::new(b.0, b.1, b.2);
                let ka = CacheKey::for_tile(&template, ca);
                let kb = CacheKey::for_tile(&template, cb);
                prop_assert_eq!(ka == kb, ca == cb);
            }
        }
    }
}
