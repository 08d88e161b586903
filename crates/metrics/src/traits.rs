//! Metrics provider traits
//!
//! Components keep their counters in atomics and hand out lightweight
//! handles implementing these traits, so the reporter can collect snapshots
//! without knowing concrete types.

use serde::Serialize;

/// Point-in-time snapshot of listener metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceMetricsSnapshot {
    pub connections_active: u64,
    pub connections_total: u64,
    pub lines_read: u64,
    pub messages_received: u64,
    pub bytes_received: u64,
    pub lines_empty: u64,
    pub lines_oversized: u64,
    pub partial_discarded: u64,
    pub idle_timeouts: u64,
    pub io_errors: u64,
    pub accept_errors: u64,
    pub messages_discarded: u64,
}

/// Point-in-time snapshot of relay queue metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueMetricsSnapshot {
    pub capacity: u64,
    pub depth: u64,
    pub enqueued: u64,
    pub dequeued: u64,
    /// Enqueues that found the queue full and had to wait
    pub enqueue_waits: u64,
}

/// Point-in-time snapshot of producer pool metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublisherMetricsSnapshot {
    pub workers: u64,
    pub workers_active: u64,
    /// Messages accepted by the broker client
    pub published: u64,
    /// Messages the broker client refused immediately
    pub publish_failed: u64,
    /// Messages the broker acknowledged
    pub delivered: u64,
    /// Messages that failed after the client's own retries
    pub delivery_failed: u64,
    /// Messages dropped because shutdown ran out of time
    pub discarded: u64,
}

/// Listener metrics provider
pub trait SourceMetricsProvider: Send + Sync {
    /// Identifier for this source instance
    fn source_id(&self) -> &str;

    fn snapshot(&self) -> SourceMetricsSnapshot;
}

/// Relay queue metrics provider
pub trait QueueMetricsProvider: Send + Sync {
    fn snapshot(&self) -> QueueMetricsSnapshot;
}

/// Producer pool metrics provider
pub trait PublisherMetricsProvider: Send + Sync {
    fn snapshot(&self) -> PublisherMetricsSnapshot;
}
