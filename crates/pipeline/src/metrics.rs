//! Relay queue metrics
//!
//! Atomic counters shared by every sender and receiver of one queue.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use relay_metrics::{QueueMetricsProvider, QueueMetricsSnapshot};

/// Metrics for the relay queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Configured capacity
    capacity: u64,

    /// Messages accepted into the queue
    enqueued: AtomicU64,

    /// Messages handed to a consumer
    dequeued: AtomicU64,

    /// Enqueues that found the queue full (backpressure events)
    enqueue_waits: AtomicU64,
}

impl QueueMetrics {
    #[inline]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity as u64,
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            enqueue_waits: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_enqueue_wait(&self) {
        self.enqueue_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Approximate number of messages currently buffered
    #[inline]
    pub fn depth(&self) -> u64 {
        let enqueued = self.enqueued.load(Ordering::Relaxed);
        let dequeued = self.dequeued.load(Ordering::Relaxed);
        enqueued.saturating_sub(dequeued)
    }

    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            capacity: self.capacity,
            depth: self.depth(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            enqueue_waits: self.enqueue_waits.load(Ordering::Relaxed),
        }
    }
}

/// Handle for reporting queue metrics
///
/// Holds an `Arc` to the metrics, so it remains valid after the queue
/// ends are moved into their tasks.
#[derive(Debug, Clone)]
pub struct QueueMetricsHandle {
    pub(crate) metrics: Arc<QueueMetrics>,
}

impl QueueMetricsProvider for QueueMetricsHandle {
    fn snapshot(&self) -> QueueMetricsSnapshot {
        self.metrics.snapshot()
    }
}
