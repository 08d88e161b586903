//! Periodic metrics reporter
//!
//! Collects snapshots from the listener, the relay queue, and the producer
//! pool at the configured interval and writes them through `tracing`.

use std::sync::Arc;

use relay_config::{MetricsConfig, MetricsFormat};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    PublisherMetricsProvider, PublisherMetricsSnapshot, QueueMetricsProvider,
    QueueMetricsSnapshot, SourceMetricsProvider, SourceMetricsSnapshot,
};

/// Builder for constructing a `MetricsReporter`
#[derive(Default)]
pub struct MetricsReporterBuilder {
    config: Option<MetricsConfig>,
    sources: Vec<Arc<dyn SourceMetricsProvider>>,
    queue: Option<Arc<dyn QueueMetricsProvider>>,
    publisher: Option<Arc<dyn PublisherMetricsProvider>>,
}

impl MetricsReporterBuilder {
    pub fn config(mut self, config: MetricsConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn source(mut self, provider: Arc<dyn SourceMetricsProvider>) -> Self {
        self.sources.push(provider);
        self
    }

    pub fn queue(mut self, provider: Arc<dyn QueueMetricsProvider>) -> Self {
        self.queue = Some(provider);
        self
    }

    pub fn publisher(mut self, provider: Arc<dyn PublisherMetricsProvider>) -> Self {
        self.publisher = Some(provider);
        self
    }

    pub fn build(self) -> MetricsReporter {
        MetricsReporter {
            config: self.config.unwrap_or_default(),
            sources: self.sources,
            queue: self.queue,
            publisher: self.publisher,
        }
    }
}

/// Metrics reporter
pub struct MetricsReporter {
    config: MetricsConfig,
    sources: Vec<Arc<dyn SourceMetricsProvider>>,
    queue: Option<Arc<dyn QueueMetricsProvider>>,
    publisher: Option<Arc<dyn PublisherMetricsProvider>>,
}

impl MetricsReporter {
    pub fn builder() -> MetricsReporterBuilder {
        MetricsReporterBuilder::default()
    }

    /// Run the reporter until cancellation, emitting one final report on the way out
    pub async fn run(self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("metrics reporting disabled");
            return;
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so the first report
        // covers a full interval.
        ticker.tick().await;

        info!(
            interval_secs = self.config.interval.as_secs(),
            format = ?self.config.format,
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.report();
                    info!("metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }
    }

    /// Collect and log metrics once
    pub fn report(&self) {
        for line in self.render() {
            info!("{}", line);
        }
    }

    /// Render the current metrics in the configured format
    pub fn render(&self) -> Vec<String> {
        let sources: Vec<(String, SourceMetricsSnapshot)> = self
            .sources
            .iter()
            .map(|s| (s.source_id().to_string(), s.snapshot()))
            .collect();
        let queue = self.queue.as_ref().map(|q| q.snapshot());
        let publisher = self.publisher.as_ref().map(|p| p.snapshot());

        match self.config.format {
            MetricsFormat::Human => render_human(&sources, queue, publisher),
            MetricsFormat::Json => vec![render_json(&sources, queue, publisher)],
        }
    }
}

fn render_human(
    sources: &[(String, SourceMetricsSnapshot)],
    queue: Option<QueueMetricsSnapshot>,
    publisher: Option<PublisherMetricsSnapshot>,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(sources.len() + 2);

    for (id, s) in sources {
        lines.push(format!(
            "[metrics] source {id}: {} conn ({} total) | {} msgs | {} bytes | idle {} | partial {} | oversized {} | io_err {}",
            s.connections_active,
            s.connections_total,
            s.messages_received,
            s.bytes_received,
            s.idle_timeouts,
            s.partial_discarded,
            s.lines_oversized,
            s.io_errors,
        ));
    }

    if let Some(q) = queue {
        lines.push(format!(
            "[metrics] queue: {}/{} | in {} | out {} | waits {}",
            q.depth, q.capacity, q.enqueued, q.dequeued, q.enqueue_waits,
        ));
    }

    if let Some(p) = publisher {
        lines.push(format!(
            "[metrics] producer: {}/{} workers | published {} | failed {} | delivered {} | delivery_failed {} | discarded {}",
            p.workers_active,
            p.workers,
            p.published,
            p.publish_failed,
            p.delivered,
            p.delivery_failed,
            p.discarded,
        ));
    }

    lines
}

fn render_json(
    sources: &[(String, SourceMetricsSnapshot)],
    queue: Option<QueueMetricsSnapshot>,
    publisher: Option<PublisherMetricsSnapshot>,
) -> String {
    let sources: Vec<serde_json::Value> = sources
        .iter()
        .map(|(id, s)| serde_json::json!({ "id": id, "metrics": s }))
        .collect();

    serde_json::json!({
        "sources": sources,
        "queue": queue,
        "producer": publisher,
    })
    .to_string()
}
