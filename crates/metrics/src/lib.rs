//! Relay - Metrics
//!
//! Metric snapshots, provider traits, and the periodic reporter.
//!
//! # Metrics Handle Pattern
//!
//! Components keep `Arc<...Metrics>` internally and provide a
//! `metrics_handle()` method returning a handle that implements the matching
//! provider trait. The handle stays valid after `run()` consumes the component.
//!
//! ```text
//! Component (owns Arc<Metrics>)
//!     │
//!     ├──► metrics_handle() → Handle (clones Arc, implements Provider trait)
//!     │
//!     └──► run() [consumes self, Arc keeps metrics alive]
//! ```
//!
//! # Example
//!
//! ```ignore
//! let reporter = MetricsReporter::builder()
//!     .config(config.metrics.clone())
//!     .source(Arc::new(source.metrics_handle()))
//!     .queue(Arc::new(queue.metrics_handle()))
//!     .publisher(Arc::new(pool.metrics_handle()))
//!     .build();
//!
//! tokio::spawn(reporter.run(cancel.clone()));
//! ```

mod reporter;
mod traits;

pub use reporter::{MetricsReporter, MetricsReporterBuilder};
pub use traits::{
    PublisherMetricsProvider, PublisherMetricsSnapshot, QueueMetricsProvider,
    QueueMetricsSnapshot, SourceMetricsProvider, SourceMetricsSnapshot,
};
