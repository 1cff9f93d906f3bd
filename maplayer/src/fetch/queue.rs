//! Priority queue for pending fetch jobs.
//!
//! Jobs are ordered by priority (viewport before preload), then by submission
//! order (FIFO within the same priority level). The pool dequeues from this
//! queue whenever a concurrency slot frees up, so a viewport request queued
//! after preload work still runs first — pre-emption happens at dequeue time,
//! never mid-flight.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

/// Boxed unit future executed by a pool worker.
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Scheduling priority of a tile request.
///
/// `Viewport` requests come from the renderer and are served before
/// `Preload` requests, which speculatively warm neighboring tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Background ring prefetch.
    Preload,
    /// A tile the renderer is waiting to draw.
    Viewport,
}

/// A fetch job waiting for a concurrency slot.
pub struct QueuedJob {
    /// Scheduling priority.
    pub priority: Priority,
    /// Cancellation token; a job cancelled while queued is dropped without
    /// ever consuming a slot.
    pub token: CancellationToken,
    /// The work to run once a slot is available.
    pub future: JobFuture,
    /// Submission order within the queue, for FIFO within a priority level.
    seq: u64,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then lower sequence (older) first.
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ordering => ordering,
        }
    }
}

impl std::fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedJob")
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Priority-then-FIFO queue of pending fetch jobs.
///
/// Not thread-safe on its own; the pool wraps it in a mutex. The sequence
/// counter lives in the queue instance rather than in process-global state.
pub struct RequestQueue {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
}

impl RequestQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Enqueues a job, assigning its FIFO sequence number.
    pub fn push(&mut self, priority: Priority, token: CancellationToken, future: JobFuture) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedJob {
            priority,
            token,
            future,
            seq,
        });
    }

    /// Removes and returns the highest-priority job.
    pub fn pop(&mut self) -> Option<QueuedJob> {
        self.heap.pop()
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every queued job.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
