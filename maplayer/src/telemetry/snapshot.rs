//! Point-in-time view of the engine counters.

use std::fmt;

use serde::Serialize;

/// A copy of every engine counter taken at one instant.
///
/// Serializable so the host bridge can report cache statistics across the
/// method channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    pub preloads_scheduled: u64,
}

impl MetricsSnapshot {
    /// Memory-tier hit rate over `0.0..=1.0`, or `None` before any lookups.
    pub fn memory_hit_rate(&self) -> Option<f64> {
        let total = self.memory_hits + self.memory_misses;
        (total > 0).then(|| self.memory_hits as f64 / total as f64)
    }

    /// Disk-tier hit rate over `0.0..=1.0`, or `None` before any lookups.
    pub fn disk_hit_rate(&self) -> Option<f64> {
        let total = self.disk_hits + self.disk_misses;
        (total > 0).then(|| self.disk_hits as f64 / total as f64)
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory {}/{} hit, disk {}/{} hit, fetches {} ok / {} failed, {} preloads",
            self.memory_hits,
            self.memory_hits + self.memory_misses,
            self.disk_hits,
            self.disk_hits + self.disk_misses,
            self.fetches_succeeded,
            self.fetches_failed,
            self.preloads_scheduled,
        )
    }
}
