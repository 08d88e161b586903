//! Relay - Sources
//!
//! Network sources that read newline-delimited lines from clients and push
//! them onto the relay queue.
//!
//! # Available Sources
//!
//! - **TCP** - plain TCP, one message per line, idle-read deadline per line
//!
//! # Design Principles
//!
//! - **Bounded memory**: each connection holds at most one line of
//!   `max_line_size` bytes plus its read buffer
//! - **Async I/O**: Built on `tokio` for non-blocking operations
//! - **Failure isolation**: timeouts and socket errors close only the
//!   connection they happen on
//! - **Lock-free metrics**: atomic counters exposed through a metrics handle
//!
//! # Example
//!
//! ```ignore
//! use relay_pipeline::relay_queue;
//! use relay_sources::{LineSource, LineSourceConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = LineSourceConfig {
//!     address: "0.0.0.0".into(),
//!     port: 9000,
//!     ..Default::default()
//! };
//!
//! let (tx, rx) = relay_queue(1000);
//! let source = LineSource::new(config, tx);
//! source.run(CancellationToken::new()).await?;
//! ```

pub mod framing;
pub mod tcp;

// Common types for sources
mod common;

pub use common::SourceMetrics;
pub use framing::{ReadLineResult, read_bounded_line};
pub use tcp::{LineSource, LineSourceConfig, LineSourceMetricsHandle, SourceError};
