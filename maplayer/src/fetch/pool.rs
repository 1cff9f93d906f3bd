//! Bounded worker pool for tile fetches.
//!
//! At most `limit` jobs execute concurrently per pool instance; excess
//! submissions wait in a [`RequestQueue`] and are dequeued
//! priority-then-FIFO. A concurrency slot is always released when a job
//! finishes — on success, failure, panic or cancellation — so the pool can
//! never leak capacity.
//!
//! The pool is the process-wide choke point for network and disk work:
//! cache misses are handed to it and the synchronous tile-request path
//! returns immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::fetch::queue::{JobFuture, Priority, RequestQueue};

/// Fallback pool capacity when the configured limit is zero or negative.
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 4;

/// Handle to a submitted fetch job.
///
/// Cancelling drops the job if it has not started; a running job is
/// cancelled best-effort (its future is raced against the token). Either
/// way the concurrency slot is released promptly.
#[derive(Clone)]
pub struct FetchHandle {
    token: CancellationToken,
}

impl FetchHandle {
    /// Request cancellation of the job.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct PoolInner {
    queue: Mutex<RequestQueue>,
    running: AtomicUsize,
    limit: AtomicUsize,
    /// Woken on submit, job completion, limit change and shutdown.
    wake: Notify,
    shutdown: CancellationToken,
}

/// Releases a concurrency slot when dropped, so the slot is returned even if
/// the job future panics.
struct SlotGuard {
    inner: Arc<PoolInner>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.running.fetch_sub(1, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }
}

/// Bounded fetch worker pool.
///
/// Shared process-wide across all tile overlays; clone the `Arc` it is
/// handed around in. Constructing a pool spawns its dispatcher task, so a
/// Tokio runtime must be running.
pub struct FetchPool {
    inner: Arc<PoolInner>,
}

impl FetchPool {
    /// Creates a pool executing at most `limit` jobs concurrently.
    ///
    /// A limit of zero is clamped to one; configuration-level defaulting
    /// (zero or negative configured value falls back to
    /// [`DEFAULT_CONCURRENT_REQUESTS`]) happens in the overlay options.
    pub fn new(limit: usize) -> Self {
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(RequestQueue::new()),
            running: AtomicUsize::new(0),
            limit: AtomicUsize::new(limit.max(1)),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(Self::dispatch(Arc::clone(&inner)));

        Self { inner }
    }

    /// Submits a job with a fresh cancellation token.
    pub fn submit(&self, priority: Priority, future: JobFuture) -> FetchHandle {
        self.submit_with_token(priority, CancellationToken::new(), future)
    }

    /// Submits a job tied to an existing token (e.g. an overlay's, so that
    /// removing the overlay cancels all of its outstanding requests).
    pub fn submit_with_token(
        &self,
        priority: Priority,
        token: CancellationToken,
        future: JobFuture,
    ) -> FetchHandle {
        let handle = FetchHandle {
            token: token.clone(),
        };
        self.inner.queue.lock().push(priority, token, future);
        self.inner.wake.notify_one();
        handle
    }

    /// Replaces the concurrency limit.
    ///
    /// A lowered limit takes effect as running jobs drain; nothing is
    /// cancelled mid-flight.
    pub fn set_limit(&self, limit: usize) {
        self.inner.limit.store(limit.max(1), Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    /// The current concurrency limit.
    pub fn limit(&self) -> usize {
        self.inner.limit.load(Ordering::SeqCst)
    }

    /// Number of jobs currently executing.
    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Number of jobs waiting for a slot.
    pub fn queued(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Stops the dispatcher and drops every queued job. Running jobs are
    /// cancelled best-effort. Terminal.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.queue.lock().clear();
        self.inner.wake.notify_one();
    }

    async fn dispatch(inner: Arc<PoolInner>) {
        loop {
            if inner.shutdown.is_cancelled() {
                debug!("fetch pool dispatcher stopping");
                return;
            }

            // Start queued jobs while capacity remains.
            loop {
                if inner.running.load(Ordering::SeqCst) >= inner.limit.load(Ordering::SeqCst) {
                    break;
                }
                let job = match inner.queue.lock().pop() {
                    Some(job) => job,
                    None => break,
                };
                // Cancelled while queued: dropped without consuming a slot.
                if job.token.is_cancelled() {
                    continue;
                }

                inner.running.fetch_add(1, Ordering::SeqCst);
                let guard = SlotGuard {
                    inner: Arc::clone(&inner),
                };
                let token = job.token;
                let future = job.future;
                let shutdown = inner.shutdown.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = shutdown.cancelled() => {}
                        _ = future => {}
                    }
                });
            }

            tokio::select! {
                _ = inner.shutdown.cancelled() => return,
                _ = inner.wake.notified() => {}
            }
        }
    }
}
