//! Common types for sources
//!
//! Counters shared by the acceptor and every line reader of one source.

use std::sync::atomic::{AtomicU64, Ordering};

use relay_metrics::SourceMetricsSnapshot;

/// Line source metrics
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// Currently open connections
    pub connections_active: AtomicU64,

    /// Total connections accepted
    pub connections_total: AtomicU64,

    /// Complete lines read, including empty ones
    pub lines_read: AtomicU64,

    /// Messages handed to the relay queue
    pub messages_received: AtomicU64,

    /// Bytes read for those messages, delimiters included
    pub bytes_received: AtomicU64,

    /// Lines that were empty after stripping the delimiter
    pub lines_empty: AtomicU64,

    /// Lines longer than the configured maximum
    pub lines_oversized: AtomicU64,

    /// Unterminated data dropped at end of stream
    pub partial_discarded: AtomicU64,

    /// Connections closed by the idle-read deadline
    pub idle_timeouts: AtomicU64,

    /// Connections closed by a socket error
    pub io_errors: AtomicU64,

    /// Failed `accept()` calls
    pub accept_errors: AtomicU64,

    /// Complete lines dropped because shutdown arrived while queueing
    pub messages_discarded: AtomicU64,
}

impl SourceMetrics {
    pub const fn new() -> Self {
        Self {
            connections_active: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            lines_read: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            lines_empty: AtomicU64::new(0),
            lines_oversized: AtomicU64::new(0),
            partial_discarded: AtomicU64::new(0),
            idle_timeouts: AtomicU64::new(0),
            io_errors: AtomicU64::new(0),
            accept_errors: AtomicU64::new(0),
            messages_discarded: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn line_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_received(&self, bytes: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn line_empty(&self) {
        self.lines_empty.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn line_oversized(&self) {
        self.lines_oversized.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn partial_discarded(&self) {
        self.partial_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn idle_timeout(&self) {
        self.idle_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn io_error(&self) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_discarded(&self) {
        self.messages_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> SourceMetricsSnapshot {
        SourceMetricsSnapshot {
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            lines_read: self.lines_read.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            lines_empty: self.lines_empty.load(Ordering::Relaxed),
            lines_oversized: self.lines_oversized.load(Ordering::Relaxed),
            partial_discarded: self.partial_discarded.load(Ordering::Relaxed),
            idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            messages_discarded: self.messages_discarded.load(Ordering::Relaxed),
        }
    }
}
