//! Relay - Pipeline
//!
//! The bounded queue that connects line readers to producer workers.
//!
//! # Architecture
//!
//! ```text
//! [Line readers]                [Relay queue]              [Producer workers]
//!    conn 1 ──┐                                          ┌──→ worker 0 ──→ broker
//!    conn 2 ──┼──→ QueueSender ──→ bounded MPMC ──→ QueueReceiver ─┼──→ worker 1 ──→ broker
//!    conn N ──┘                     (capacity C)         └──→ worker N ──→ broker
//! ```
//!
//! # Key Design
//!
//! - **Backpressure**: a full queue makes `enqueue` wait, so a slow broker
//!   slows down readers and, through TCP flow control, clients
//! - **MPMC**: any idle worker takes the next message
//! - **Close on drop**: when every sender is dropped, workers drain the rest
//!   and then see `None`
//!
//! # Example
//!
//! ```ignore
//! use relay_pipeline::{Message, relay_queue};
//!
//! let (tx, rx) = relay_queue(1000);
//!
//! tokio::spawn(async move {
//!     while let Some(message) = rx.dequeue().await {
//!         // publish message.payload()
//!     }
//! });
//!
//! tx.enqueue(Message::new(1, "hello")).await?;
//! ```

mod error;
mod message;
mod metrics;
mod queue;

pub use error::{QueueError, Result};
pub use message::Message;
pub use metrics::{QueueMetrics, QueueMetricsHandle};
pub use queue::{QueueReceiver, QueueSender, relay_queue};

/// Default relay queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
