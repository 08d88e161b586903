//! Producer pool metrics
//!
//! Shared by every worker and by the broker client callbacks. Relaxed
//! atomics; values are eventually consistent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use relay_metrics::{PublisherMetricsProvider, PublisherMetricsSnapshot};

/// Metrics for the producer worker pool
#[derive(Debug, Default)]
pub struct PublisherMetrics {
    workers: AtomicU64,
    workers_active: AtomicU64,
    published: AtomicU64,
    publish_failed: AtomicU64,
    delivered: AtomicU64,
    delivery_failed: AtomicU64,
    discarded: AtomicU64,
}

impl PublisherMetrics {
    pub const fn new() -> Self {
        Self {
            workers: AtomicU64::new(0),
            workers_active: AtomicU64::new(0),
            published: AtomicU64::new(0),
            publish_failed: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            delivery_failed: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn set_workers(&self, workers: usize) {
        self.workers.store(workers as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn worker_started(&self) {
        self.workers_active.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn worker_stopped(&self) {
        self.workers_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Message accepted by the broker client
    #[inline]
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Message refused by the broker client
    #[inline]
    pub fn record_publish_failed(&self) {
        self.publish_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Broker acknowledged a message
    #[inline]
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Broker client gave up on a message after its own retries
    #[inline]
    pub fn record_delivery_failed(&self) {
        self.delivery_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages dropped because shutdown ran out of time
    #[inline]
    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn workers_active(&self) -> u64 {
        self.workers_active.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PublisherMetricsSnapshot {
        PublisherMetricsSnapshot {
            workers: self.workers.load(Ordering::Relaxed),
            workers_active: self.workers_active.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            publish_failed: self.publish_failed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failed: self.delivery_failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Handle for reporting producer pool metrics
#[derive(Debug, Clone)]
pub struct PublisherMetricsHandle {
    pub(crate) metrics: Arc<PublisherMetrics>,
}

impl PublisherMetricsProvider for PublisherMetricsHandle {
    fn snapshot(&self) -> PublisherMetricsSnapshot {
        self.metrics.snapshot()
    }
}
