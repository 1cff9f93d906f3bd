//! Bounded-concurrency tile fetching
//!
//! A [`FetchPool`] caps the number of simultaneously executing fetch jobs and
//! queues the rest with viewport-over-preload prioritization. The actual
//! network access sits behind the [`TileFetcher`] trait so tests can inject
//! a mock client.

mod http;
mod pool;
mod queue;

pub use http::{FetchError, ReqwestFetcher, TileFetcher};
pub use pool::{FetchHandle, FetchPool, DEFAULT_CONCURRENT_REQUESTS};
pub use queue::{Priority, QueuedJob, RequestQueue};

#[cfg(test)]
pub use http::tests::MockFetcher;
