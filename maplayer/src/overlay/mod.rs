//! Tile overlay configuration and lifecycle
//!
//! An overlay moves through `Unbuilt → Built → Updated* → Removed`. The
//! [`TileOverlayOptions`] object is the unbuilt stage: every option is
//! settable and can be decoded from the key/value payloads the dispatch
//! collaborator hands across the method channel. Building produces a
//! [`TileOverlay`], whose URL template is frozen; the remaining options stay
//! mutable through [`TileOverlay::update`]. The [`TileOverlayRegistry`]
//! exposes the add/update/remove command surface over a set of overlays.

mod controller;
mod options;
mod registry;

pub use controller::{OverlayError, TileOverlay};
pub use options::TileOverlayOptions;
pub use registry::TileOverlayRegistry;
