//! Relay - Publisher
//!
//! The broker side of the relay: a publisher capability and the pool of
//! workers that drains the relay queue into it.
//!
//! # Architecture
//!
//! ```text
//!                                 ┌──→ lane 0 ──→ worker 0 ──→ Box<dyn Publisher> ──┐
//! QueueReceiver ──→ dispatcher ───┼──→ lane 1 ──→ worker 1 ──→ Box<dyn Publisher> ──┼──→ broker
//!                                 └──→ lane N ──→ worker N ──→ Box<dyn Publisher> ──┘
//! ```
//!
//! Lines of one connection always land in the same lane, so they reach the
//! broker client in the order they were read.
//!
//! # Publishers
//!
//! - **Kafka** (`kafka` feature, default) - `rdkafka` threaded producer
//! - **Recording** (`testing` feature) - in-memory test doubles
//!
//! # Delivery
//!
//! At most once. A message the broker client refuses is logged and dropped;
//! messages still queued when the shutdown grace period ends are discarded.
//!
//! # Example
//!
//! ```ignore
//! use relay_publisher::{KafkaPublisherFactory, WorkerPool, WorkerPoolConfig};
//!
//! let factory = KafkaPublisherFactory::new(config.broker.clone());
//! let pool_config = WorkerPoolConfig::from_config(&config.producer, &config.broker);
//! let pool = WorkerPool::start(pool_config, &factory, rx).await?;
//!
//! // ... drop every QueueSender ...
//! let report = pool.shutdown().await;
//! ```

mod error;
mod metrics;
mod pool;
mod publisher;
mod rate_limited_logger;

#[cfg(feature = "kafka")]
pub mod kafka;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{PoolError, PublishError};
pub use metrics::{PublisherMetrics, PublisherMetricsHandle};
pub use pool::{DEFAULT_LANE_CAPACITY, ShutdownReport, WorkerPool, WorkerPoolConfig};
pub use publisher::{Publisher, PublisherFactory};
pub use rate_limited_logger::{RateLimitedLogger, payload_hash, payload_preview};

#[cfg(feature = "kafka")]
pub use kafka::{KafkaPublisher, KafkaPublisherFactory};
