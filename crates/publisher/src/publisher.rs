//! Broker publisher capability
//!
//! The pool only ever talks to a broker through these two traits. Kafka is
//! one implementation; the `testing` module provides others.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::PublishError;
use crate::metrics::PublisherMetrics;

/// A long-lived handle to the broker, owned by exactly one worker
#[async_trait]
pub trait Publisher: Send {
    /// Hand one payload to the broker client
    ///
    /// `Ok` means the client accepted the message for delivery. Final
    /// delivery outcomes are reported by the implementation itself.
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), PublishError>;

    /// Flush in-flight messages, waiting at most `timeout`
    async fn close(self: Box<Self>, timeout: Duration) -> Result<(), PublishError>;
}

/// Creates one publisher handle per worker
#[async_trait]
pub trait PublisherFactory: Send + Sync {
    /// Create the handle for `worker_id`
    ///
    /// Implementations report delivery outcomes through `metrics`.
    async fn create(
        &self,
        worker_id: usize,
        metrics: Arc<PublisherMetrics>,
    ) -> Result<Box<dyn Publisher>, PublishError>;

    /// Name for logging
    fn name(&self) -> &'static str;
}
