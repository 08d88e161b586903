//! Bounded multi-producer, multi-consumer relay queue
//!
//! Every line reader holds a `QueueSender`; every producer worker holds a
//! `QueueReceiver`. Both ends are cheap to clone.
//!
//! # Guarantees
//!
//! - At most `capacity` messages are buffered at any time
//! - `enqueue` waits while the queue is full; it never drops a message
//! - Messages from one sender are dequeued in the order that sender
//!   enqueued them (a sender awaits each enqueue before the next)
//! - Once every sender is dropped, receivers drain what is left and then
//!   `dequeue` returns `None`

use std::sync::Arc;

use crossfire::{MAsyncRx, MAsyncTx, TrySendError};

use crate::error::{QueueError, Result};
use crate::message::Message;
use crate::metrics::{QueueMetrics, QueueMetricsHandle};

/// Create a relay queue with the given capacity
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn relay_queue(capacity: usize) -> (QueueSender, QueueReceiver) {
    assert!(capacity > 0, "relay queue requires a capacity of at least 1");

    let (tx, rx) = crossfire::mpmc::bounded_async::<Message>(capacity);
    let metrics = Arc::new(QueueMetrics::new(capacity));

    (
        QueueSender {
            tx,
            metrics: Arc::clone(&metrics),
        },
        QueueReceiver { rx, metrics },
    )
}

/// Producer end of the relay queue
#[derive(Clone)]
pub struct QueueSender {
    tx: MAsyncTx<Message>,
    metrics: Arc<QueueMetrics>,
}

impl QueueSender {
    /// Add a message, waiting while the queue is full
    ///
    /// Returns `QueueError::Closed` only when every receiver has been dropped.
    pub async fn enqueue(&self, message: Message) -> Result<()> {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                self.metrics.record_enqueue_wait();
                self.tx
                    .send(message)
                    .await
                    .map_err(|_| QueueError::Closed)?;
            }
            Err(TrySendError::Disconnected(_)) => return Err(QueueError::Closed),
        }

        self.metrics.record_enqueued();
        Ok(())
    }

    /// Handle for metrics reporting
    pub fn metrics_handle(&self) -> QueueMetricsHandle {
        QueueMetricsHandle {
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl std::fmt::Debug for QueueSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSender")
            .field("depth", &self.metrics.depth())
            .finish()
    }
}

/// Consumer end of the relay queue
#[derive(Clone)]
pub struct QueueReceiver {
    rx: MAsyncRx<Message>,
    metrics: Arc<QueueMetrics>,
}

impl QueueReceiver {
    /// Take the next message, waiting while the queue is empty
    ///
    /// Returns `None` once all senders are gone and the queue is drained.
    pub async fn dequeue(&self) -> Option<Message> {
        let message = self.rx.recv().await.ok()?;
        self.metrics.record_dequeued();
        Some(message)
    }

    /// Take the next message if one is buffered
    pub fn try_dequeue(&self) -> Option<Message> {
        let message = self.rx.try_recv().ok()?;
        self.metrics.record_dequeued();
        Some(message)
    }

    /// Approximate number of buffered messages
    pub fn depth(&self) -> u64 {
        self.metrics.depth()
    }

    /// Handle for metrics reporting
    pub fn metrics_handle(&self) -> QueueMetricsHandle {
        QueueMetricsHandle {
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl std::fmt::Debug for QueueReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueReceiver")
            .field("depth", &self.metrics.depth())
            .finish()
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
