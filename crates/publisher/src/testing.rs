//! Test doubles for the publisher capability
//!
//! `RecordingFactory` builds publishers that store every accepted payload in
//! memory. It can also be told to fail initialization for one worker, to
//! reject or stall selected payloads, or to hold every publish behind a
//! `Gate` so tests can observe how many publishes are in flight at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::PublishError;
use crate::metrics::PublisherMetrics;
use crate::publisher::{Publisher, PublisherFactory};

/// One accepted publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub worker_id: usize,
    pub topic: String,
    pub payload: Bytes,
}

type RejectFn = dyn Fn(&[u8]) -> bool + Send + Sync;
type DelayFn = dyn Fn(&[u8]) -> Option<Duration> + Send + Sync;

/// Holds publishes until opened
#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        let (open, _) = watch::channel(false);
        Arc::new(Self {
            open,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Let every waiting and future publish through
    pub fn open(&self) {
        self.open.send_replace(true);
    }

    /// Publishes currently waiting at the gate
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of publishes that waited at the gate together
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Shared {
    records: Mutex<Vec<Record>>,
    created: AtomicUsize,
    closed: AtomicUsize,
}

/// Factory for in-memory publishers
#[derive(Clone, Default)]
pub struct RecordingFactory {
    shared: Arc<Shared>,
    fail_init_at: Option<usize>,
    reject: Option<Arc<RejectFn>>,
    delay: Option<Arc<DelayFn>>,
    gate: Option<Arc<Gate>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `create` for this worker id
    pub fn fail_init_at(mut self, worker_id: usize) -> Self {
        self.fail_init_at = Some(worker_id);
        self
    }

    /// Reject every payload for which `predicate` returns true
    pub fn reject_when(mut self, predicate: impl Fn(&[u8]) -> bool + Send + Sync + 'static) -> Self {
        self.reject = Some(Arc::new(predicate));
        self
    }

    /// Stall the publish of a payload for as long as `delay` says
    pub fn delay_when(
        mut self,
        delay: impl Fn(&[u8]) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Arc::new(delay));
        self
    }

    /// Hold every publish at `gate` until it is opened
    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Accepted publishes, in acceptance order
    pub fn records(&self) -> Vec<Record> {
        self.shared.records.lock().clone()
    }

    /// Accepted payloads as strings, in acceptance order
    pub fn payloads(&self) -> Vec<String> {
        self.shared
            .records
            .lock()
            .iter()
            .map(|r| String::from_utf8_lossy(&r.payload).into_owned())
            .collect()
    }

    /// Handles successfully created
    pub fn created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    /// Handles closed
    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublisherFactory for RecordingFactory {
    async fn create(
        &self,
        worker_id: usize,
        metrics: Arc<PublisherMetrics>,
    ) -> Result<Box<dyn Publisher>, PublishError> {
        if self.fail_init_at == Some(worker_id) {
            return Err(PublishError::Init(format!(
                "worker {worker_id} refused to start"
            )));
        }

        self.shared.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(RecordingPublisher {
            worker_id,
            shared: Arc::clone(&self.shared),
            reject: self.reject.clone(),
            delay: self.delay.clone(),
            gate: self.gate.clone(),
            metrics,
        }))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// In-memory publisher created by `RecordingFactory`
pub struct RecordingPublisher {
    worker_id: usize,
    shared: Arc<Shared>,
    reject: Option<Arc<RejectFn>>,
    delay: Option<Arc<DelayFn>>,
    gate: Option<Arc<Gate>>,
    metrics: Arc<PublisherMetrics>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }

        if let Some(delay) = &self.delay
            && let Some(pause) = delay(payload.as_ref())
        {
            tokio::time::sleep(pause).await;
        }

        if let Some(reject) = &self.reject
            && reject(payload.as_ref())
        {
            return Err(PublishError::Rejected("rejected by test predicate".into()));
        }

        self.shared.records.lock().push(Record {
            worker_id: self.worker_id,
            topic: topic.to_string(),
            payload,
        });
        // Acknowledged immediately
        self.metrics.record_delivered();
        Ok(())
    }

    async fn close(self: Box<Self>, _timeout: Duration) -> Result<(), PublishError> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
