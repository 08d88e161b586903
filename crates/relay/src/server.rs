//! Relay lifecycle
//!
//! Startup order: queue, producer pool, listener, acceptor, reporter. The
//! pool comes up complete before the listener binds, so no traffic is
//! accepted unless every publisher handle initialized.
//!
//! Shutdown runs the other way. The acceptor and its readers stop first and
//! drop their queue handles; the pool then drains the queue within its grace
//! period; the reporter emits one last snapshot.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use relay_config::Config;
use relay_metrics::MetricsReporter;
use relay_pipeline::{QueueSender, relay_queue};
use relay_publisher::{PublisherFactory, ShutdownReport, WorkerPool, WorkerPoolConfig};
use relay_sources::{LineSource, LineSourceConfig, SourceError};

/// A started relay
pub struct Relay {
    cancel: CancellationToken,
    reporter_cancel: CancellationToken,
    queue: QueueSender,
    pool: WorkerPool,
    acceptor: JoinHandle<Result<(), SourceError>>,
    reporter: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl Relay {
    /// Start every component
    ///
    /// Fails without accepting any connection if a publisher handle cannot
    /// be created or the listener cannot bind.
    pub async fn start(config: &Config, factory: &dyn PublisherFactory) -> Result<Self> {
        let (queue, receiver) = relay_queue(config.queue.capacity);
        let queue_metrics = receiver.metrics_handle();

        let pool_config = WorkerPoolConfig::from_config(&config.producer, &config.broker);
        let pool = WorkerPool::start(pool_config, factory, receiver)
            .await
            .context("failed to start producer pool")?;

        let source = LineSource::new(LineSourceConfig::from(&config.listener), queue.clone());

        let bound = async {
            let listener = source.bind().await?;
            let local_addr = listener.local_addr()?;
            Ok::<_, SourceError>((listener, local_addr))
        }
        .await;

        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                // Nothing was accepted; close the publishers before bailing out
                drop(source);
                drop(queue);
                pool.shutdown().await;
                return Err(e).context("failed to start listener");
            }
        };

        let reporter = MetricsReporter::builder()
            .config(config.metrics.clone())
            .source(Arc::new(source.metrics_handle()))
            .queue(Arc::new(queue_metrics))
            .publisher(Arc::new(pool.metrics_handle()))
            .build();

        let cancel = CancellationToken::new();
        let reporter_cancel = CancellationToken::new();

        let acceptor = tokio::spawn(source.serve(listener, cancel.clone()));
        let reporter = tokio::spawn(reporter.run(reporter_cancel.clone()));

        info!(
            address = %local_addr,
            workers = pool.worker_count(),
            queue_capacity = config.queue.capacity,
            topic = %config.broker.topic,
            "relay running"
        );

        Ok(Self {
            cancel,
            reporter_cancel,
            queue,
            pool,
            acceptor,
            reporter,
            local_addr,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run until `shutdown` completes or the acceptor fails, then stop
    ///
    /// Returns the pool's shutdown report, or an error if the acceptor
    /// stopped on its own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        let Self {
            cancel,
            reporter_cancel,
            queue,
            pool,
            mut acceptor,
            reporter,
            ..
        } = self;

        let finished_early = tokio::select! {
            _ = shutdown => {
                info!("shutdown signal received, stopping relay");
                None
            }
            result = &mut acceptor => Some(result),
        };

        cancel.cancel();

        let acceptor_result = match finished_early {
            Some(result) => result,
            None => acceptor.await,
        };

        // Readers are gone; this is the last sender
        drop(queue);
        let report = pool.shutdown().await;

        reporter_cancel.cancel();
        if let Err(e) = reporter.await {
            warn!(error = %e, "metrics reporter task failed");
        }

        match acceptor_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e).context("acceptor stopped"),
            Err(e) => return Err(e).context("acceptor task failed"),
        }

        info!(
            drained = report.drained,
            discarded = report.discarded,
            "relay stopped"
        );

        Ok(report)
    }
}

/// Wait for SIGINT or SIGTERM
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
