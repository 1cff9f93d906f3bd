//! Engine telemetry.
//!
//! Lock-free counters instrumenting the cache tiers and fetch path, with
//! point-in-time snapshots for display. Recording an event is a single
//! relaxed atomic increment, cheap enough for the tile-request hot path.

mod metrics;
mod snapshot;

pub use metrics::EngineMetrics;
pub use snapshot::MetricsSnapshot;

/// Initializes the global tracing subscriber.
///
/// Respects `RUST_LOG`, defaulting to `info` for this crate. Safe to call
/// once per process; later calls are ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("maplayer=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
