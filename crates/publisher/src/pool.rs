//! Producer worker pool
//!
//! N workers, each owning one publisher handle. Every handle is created
//! before any worker starts, so the pool is either complete or absent. Once
//! started, workers run independently; the pool only waits for them at
//! shutdown.
//!
//! # Lanes
//!
//! ```text
//!                                     ┌──→ lane 0 ──→ worker 0
//! relay queue ──→ dispatcher ─────────┼──→ lane 1 ──→ worker 1
//!                 (connection_id % N) └──→ lane N ──→ worker N
//! ```
//!
//! A dispatcher moves messages from the relay queue into one small bounded
//! lane per worker, picking the lane from the message's connection id. All
//! lines of one connection therefore go through the same worker, in the
//! order they were read. A full lane stalls the dispatcher, the relay queue
//! fills up behind it, and readers wait on `enqueue` as before.
//!
//! # Shutdown
//!
//! The caller drops every `QueueSender` first. The dispatcher then empties
//! the relay queue into the lanes and closes them; workers drain their lanes,
//! close their publishers, and exit. If that takes longer than the grace
//! period, the stragglers are aborted and whatever is still queued, in the
//! relay queue or in a lane, is discarded and counted.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use relay_config::{BrokerConfig, ProducerConfig};
use relay_pipeline::{QueueReceiver, QueueSender, relay_queue};
use tokio::task::JoinHandle;

use crate::error::PoolError;
use crate::metrics::{PublisherMetrics, PublisherMetricsHandle};
use crate::publisher::{Publisher, PublisherFactory};
use crate::rate_limited_logger::RateLimitedLogger;

/// Default number of messages buffered per worker lane
pub const DEFAULT_LANE_CAPACITY: usize = 16;

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of workers (and publisher handles)
    pub workers: usize,

    /// Topic every message is published to
    pub topic: String,

    /// How long shutdown waits for workers to drain the queue
    pub shutdown_grace: Duration,

    /// Flush timeout passed to each publisher's `close`
    pub close_timeout: Duration,

    /// Messages buffered between the dispatcher and each worker
    pub lane_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 25,
            topic: "topic".into(),
            shutdown_grace: Duration::from_secs(10),
            close_timeout: Duration::from_secs(10),
            lane_capacity: DEFAULT_LANE_CAPACITY,
        }
    }
}

impl WorkerPoolConfig {
    pub fn from_config(producer: &ProducerConfig, broker: &BrokerConfig) -> Self {
        Self {
            workers: producer.workers,
            topic: broker.topic.clone(),
            shutdown_grace: producer.shutdown_grace,
            close_timeout: producer.shutdown_grace,
            lane_capacity: DEFAULT_LANE_CAPACITY,
        }
    }
}

/// Outcome of `WorkerPool::shutdown`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every worker finished inside the grace period
    pub drained: bool,

    /// Queued messages dropped after the grace period
    pub discarded: u64,
}

/// Lane that serves a connection
pub(crate) fn lane_for(connection_id: u64, lanes: usize) -> usize {
    (connection_id % lanes as u64) as usize
}

/// Running producer worker pool
pub struct WorkerPool {
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    receiver: QueueReceiver,
    lanes: Vec<QueueReceiver>,
    metrics: Arc<PublisherMetrics>,
    shutdown_grace: Duration,
}

impl WorkerPool {
    /// Create every publisher handle, then spawn one worker per handle
    ///
    /// If any handle fails to initialize, the handles created so far are
    /// closed and no worker is started.
    pub async fn start(
        config: WorkerPoolConfig,
        factory: &dyn PublisherFactory,
        receiver: QueueReceiver,
    ) -> Result<Self, PoolError> {
        if config.workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let metrics = Arc::new(PublisherMetrics::new());
        metrics.set_workers(config.workers);

        let mut publishers: Vec<Box<dyn Publisher>> = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            match factory.create(worker_id, Arc::clone(&metrics)).await {
                Ok(publisher) => publishers.push(publisher),
                Err(source) => {
                    tracing::error!(
                        worker_id,
                        publisher = factory.name(),
                        error = %source,
                        "publisher initialization failed"
                    );
                    for publisher in publishers {
                        if let Err(e) = publisher.close(config.close_timeout).await {
                            tracing::warn!(error = %e, "failed to close publisher during rollback");
                        }
                    }
                    return Err(PoolError::Init { worker_id, source });
                }
            }
        }

        let topic: Arc<str> = Arc::from(config.topic.as_str());
        let logger = Arc::new(RateLimitedLogger::default());
        let lane_capacity = config.lane_capacity.max(1);

        let mut lane_senders = Vec::with_capacity(config.workers);
        let mut lanes = Vec::with_capacity(config.workers);
        let mut workers = Vec::with_capacity(config.workers);

        for (worker_id, publisher) in publishers.into_iter().enumerate() {
            let (lane_tx, lane_rx) = relay_queue(lane_capacity);

            let worker = Worker {
                worker_id,
                publisher,
                lane: lane_rx.clone(),
                topic: Arc::clone(&topic),
                metrics: Arc::clone(&metrics),
                logger: Arc::clone(&logger),
                close_timeout: config.close_timeout,
            };
            workers.push(tokio::spawn(worker.run()));

            lane_senders.push(lane_tx);
            lanes.push(lane_rx);
        }

        let dispatcher = Dispatcher {
            receiver: receiver.clone(),
            lanes: lane_senders,
            metrics: Arc::clone(&metrics),
        };
        let dispatcher = tokio::spawn(dispatcher.run());

        tracing::info!(
            workers = config.workers,
            lane_capacity,
            topic = %topic,
            publisher = factory.name(),
            "producer pool started"
        );

        Ok(Self {
            dispatcher,
            workers,
            receiver,
            lanes,
            metrics,
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn metrics(&self) -> &Arc<PublisherMetrics> {
        &self.metrics
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> PublisherMetricsHandle {
        PublisherMetricsHandle {
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Wait for the workers to drain the queue, bounded by the grace period
    ///
    /// Every `QueueSender` must already be dropped, otherwise the dispatcher
    /// keeps waiting for input and the grace period always runs out.
    pub async fn shutdown(self) -> ShutdownReport {
        let Self {
            dispatcher,
            mut workers,
            receiver,
            lanes,
            metrics,
            shutdown_grace,
        } = self;

        tracing::info!(
            grace = ?shutdown_grace,
            pending = receiver.depth() + lanes.iter().map(QueueReceiver::depth).sum::<u64>(),
            "draining producer pool"
        );

        // Finished handles are dropped so none is polled again after the timeout
        let mut dispatcher = Some(dispatcher);
        let drained = tokio::time::timeout(shutdown_grace, async {
            if let Some(handle) = dispatcher.as_mut() {
                let _ = handle.await;
                dispatcher = None;
            }
            while let Some(worker) = workers.last_mut() {
                let _ = worker.await;
                workers.pop();
            }
        })
        .await
        .is_ok();

        let mut discarded = 0;
        if !drained {
            if let Some(handle) = dispatcher {
                handle.abort();
                let _ = handle.await;
            }
            for worker in &workers {
                worker.abort();
            }
            for worker in workers {
                let _ = worker.await;
            }

            for queue in std::iter::once(&receiver).chain(lanes.iter()) {
                while queue.try_dequeue().is_some() {
                    discarded += 1;
                }
            }
            metrics.record_discarded(discarded);

            tracing::warn!(
                grace = ?shutdown_grace,
                discarded,
                "producer pool did not drain in time, remaining messages discarded"
            );
        } else {
            tracing::info!("producer pool drained");
        }

        ShutdownReport { drained, discarded }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("workers_active", &self.metrics.workers_active())
            .finish()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Moves messages from the relay queue into the worker lanes
struct Dispatcher {
    receiver: QueueReceiver,
    lanes: Vec<QueueSender>,
    metrics: Arc<PublisherMetrics>,
}

impl Dispatcher {
    async fn run(self) {
        while let Some(message) = self.receiver.dequeue().await {
            let lane = lane_for(message.connection_id(), self.lanes.len());

            // Waits while the lane is full; the relay queue absorbs the rest
            if self.lanes[lane].enqueue(message).await.is_err() {
                self.metrics.record_discarded(1);
            }
        }

        tracing::debug!("relay queue closed, dispatcher stopped");
    }
}

// =============================================================================
// Worker
// =============================================================================

struct Worker {
    worker_id: usize,
    publisher: Box<dyn Publisher>,
    lane: QueueReceiver,
    topic: Arc<str>,
    metrics: Arc<PublisherMetrics>,
    logger: Arc<RateLimitedLogger>,
    close_timeout: Duration,
}

/// Keeps `workers_active` right even when a worker is aborted
struct ActiveWorker(Arc<PublisherMetrics>);

impl ActiveWorker {
    fn enter(metrics: &Arc<PublisherMetrics>) -> Self {
        metrics.worker_started();
        Self(Arc::clone(metrics))
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.0.worker_stopped();
    }
}

impl Worker {
    async fn run(mut self) {
        let _active = ActiveWorker::enter(&self.metrics);
        tracing::debug!(worker_id = self.worker_id, "producer worker starting");

        while let Some(message) = self.lane.dequeue().await {
            self.publish(message.into_payload()).await;
        }

        if let Err(e) = self.publisher.close(self.close_timeout).await {
            tracing::warn!(worker_id = self.worker_id, error = %e, "failed to close publisher");
        }

        tracing::debug!(worker_id = self.worker_id, "producer worker stopped");
    }

    async fn publish(&mut self, payload: Bytes) {
        match self.publisher.publish(&self.topic, payload.clone()).await {
            Ok(()) => self.metrics.record_published(),
            Err(e) => {
                self.metrics.record_publish_failed();
                self.logger.publish_failed(self.worker_id, &e, &payload);
            }
        }
    }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
