//! Line TCP Source
//!
//! Accepts TCP connections and reads newline-delimited lines from each one,
//! pushing every non-empty line onto the relay queue as a `Message`.
//!
//! # Framing
//!
//! Plain TCP, one message per `\n`. A single `\r` before the `\n` is
//! stripped. No length prefix, no handshake, nothing is written back.
//!
//! # Design
//!
//! - **One task per connection** - the accept loop never waits on a reader
//! - **Idle deadline per read** - a line must complete within `idle_timeout`
//!   of the start of its read, or the connection is closed
//! - **Bounded memory** - oversized lines are consumed and dropped
//! - **Backpressure** - a full relay queue stalls only the connection that
//!   is trying to enqueue
//! - **Admission limit** - with `max_connections` set, the acceptor waits for
//!   a free slot before accepting again
//!
//! # Example
//!
//! ```ignore
//! let config = LineSourceConfig::from(&listener_config);
//! let (tx, rx) = relay_queue(1000);
//!
//! let source = LineSource::new(config, tx);
//! let listener = source.bind().await?;
//! tokio::spawn(source.serve(listener, cancel.clone()));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use relay_config::{AcceptErrorPolicy, ListenerConfig};
use relay_metrics::{SourceMetricsProvider, SourceMetricsSnapshot};
use relay_pipeline::{Message, QueueSender};

use crate::common::SourceMetrics;
use crate::framing::{ReadLineResult, is_connection_reset, read_bounded_line};

// =============================================================================
// Constants
// =============================================================================

/// Default listen port
const DEFAULT_PORT: u16 = 9000;

/// Default idle-read deadline
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum line length (1 MiB)
const DEFAULT_MAX_LINE_SIZE: usize = 1024 * 1024;

/// Default read buffer size (64KB)
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default keepalive interval (30s)
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Pause after a failed accept when the policy is `continue`
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

// =============================================================================
// Configuration
// =============================================================================

/// Line TCP source configuration
#[derive(Debug, Clone)]
pub struct LineSourceConfig {
    /// Source identifier used in logs and metrics
    pub id: String,

    /// Bind address (e.g., "0.0.0.0")
    pub address: String,

    /// Listen port (0 lets the OS choose)
    pub port: u16,

    /// Deadline for each line read, measured from the start of the read
    pub idle_timeout: Duration,

    /// Longest accepted line, delimiter excluded
    pub max_line_size: usize,

    /// Read buffer size per connection
    pub buffer_size: usize,

    /// Maximum concurrently served connections (None = unlimited)
    pub max_connections: Option<usize>,

    /// What to do when `accept()` fails
    pub accept_errors: AcceptErrorPolicy,

    /// TCP nodelay (disable Nagle's algorithm)
    pub nodelay: bool,
}

impl Default for LineSourceConfig {
    fn default() -> Self {
        Self {
            id: "tcp".into(),
            address: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_line_size: DEFAULT_MAX_LINE_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_connections: None,
            accept_errors: AcceptErrorPolicy::Fatal,
            nodelay: true,
        }
    }
}

impl From<&ListenerConfig> for LineSourceConfig {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            id: "tcp".into(),
            address: config.address.clone(),
            port: config.port,
            idle_timeout: config.idle_timeout,
            max_line_size: config.max_line_size,
            buffer_size: config.buffer_size,
            max_connections: config.max_connections,
            accept_errors: config.accept_errors,
            nodelay: config.nodelay,
        }
    }
}

impl LineSourceConfig {
    /// Create config with custom port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

// =============================================================================
// Metrics handle
// =============================================================================

/// Handle for accessing line source metrics
///
/// Remains valid after the source has been moved into its task.
#[derive(Clone)]
pub struct LineSourceMetricsHandle {
    id: String,
    metrics: Arc<SourceMetrics>,
}

impl SourceMetricsProvider for LineSourceMetricsHandle {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn snapshot(&self) -> SourceMetricsSnapshot {
        self.metrics.snapshot()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Line source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Failed to bind to address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// `accept()` failed under the fatal policy
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Source Implementation
// =============================================================================

/// Line-delimited TCP source
pub struct LineSource {
    config: LineSourceConfig,
    queue: QueueSender,
    metrics: Arc<SourceMetrics>,
    admission: Option<Arc<Semaphore>>,
}

impl LineSource {
    /// Create a new line source feeding `queue`
    pub fn new(config: LineSourceConfig, queue: QueueSender) -> Self {
        let admission = config
            .max_connections
            .map(|limit| Arc::new(Semaphore::new(limit)));

        Self {
            config,
            queue,
            metrics: Arc::new(SourceMetrics::new()),
            admission,
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &Arc<SourceMetrics> {
        &self.metrics
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> LineSourceMetricsHandle {
        LineSourceMetricsHandle {
            id: self.config.id.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Bind the listening socket
    ///
    /// Kept separate from `serve` so a bind failure surfaces before any
    /// task is spawned.
    pub async fn bind(&self) -> Result<TcpListener, SourceError> {
        let bind_addr = self.config.bind_address();

        TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| SourceError::Bind {
                address: bind_addr,
                source: e,
            })
    }

    /// Bind and serve until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<(), SourceError> {
        let listener = self.bind().await?;
        self.serve(listener, cancel).await
    }

    /// Serve connections on an already bound listener until cancelled
    ///
    /// Returns once every connection task has finished. Each task drops
    /// its queue handle on exit; `self.queue` is dropped on return.
    pub async fn serve(
        self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        let local_addr = listener.local_addr()?;

        tracing::info!(
            source_id = %self.config.id,
            address = %local_addr,
            idle_timeout = ?self.config.idle_timeout,
            max_line_size = self.config.max_line_size,
            max_connections = ?self.config.max_connections,
            "line source listening"
        );

        // Readers get their own token so a fatal accept error can stop them
        // without cancelling the rest of the process
        let readers_cancel = cancel.child_token();
        let mut readers = JoinSet::new();

        let result = self
            .accept_loop(&listener, &cancel, &readers_cancel, &mut readers)
            .await;

        readers_cancel.cancel();
        drop(listener);
        while readers.join_next().await.is_some() {}

        tracing::info!(source_id = %self.config.id, "line source stopped");

        result
    }

    /// Accept loop - hands each connection to its own reader task
    async fn accept_loop(
        &self,
        listener: &TcpListener,
        cancel: &CancellationToken,
        readers_cancel: &CancellationToken,
        readers: &mut JoinSet<()>,
    ) -> Result<(), SourceError> {
        let mut next_connection_id: u64 = 0;

        loop {
            while readers.try_join_next().is_some() {}

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = self.admit() => permit,
            };

            tokio::select! {
                _ = cancel.cancelled() => break,

                accept_result = listener.accept() => match accept_result {
                    Ok((stream, peer_addr)) => {
                        self.metrics.connection_opened();
                        self.configure_socket(&stream);

                        next_connection_id += 1;
                        let handler = ConnectionHandler {
                            config: self.config.clone(),
                            queue: self.queue.clone(),
                            metrics: Arc::clone(&self.metrics),
                            peer_addr,
                            connection_id: next_connection_id,
                        };

                        tracing::debug!(
                            peer = %peer_addr,
                            connection_id = next_connection_id,
                            "connection accepted"
                        );

                        readers.spawn(handler.handle(stream, readers_cancel.clone(), permit));
                    }
                    Err(e) => {
                        self.metrics.accept_error();

                        match self.config.accept_errors {
                            AcceptErrorPolicy::Fatal => {
                                tracing::error!(error = %e, "accept failed, stopping line source");
                                return Err(SourceError::Accept(e));
                            }
                            AcceptErrorPolicy::Continue => {
                                tracing::warn!(error = %e, "accept failed, retrying");
                                tokio::select! {
                                    _ = cancel.cancelled() => break,
                                    _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                                }
                            }
                        }
                    }
                },
            }
        }

        Ok(())
    }

    /// Wait for an admission slot when a connection limit is configured
    async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        let semaphore = self.admission.as_ref()?;

        if semaphore.available_permits() == 0 {
            tracing::debug!(
                max_connections = ?self.config.max_connections,
                "connection limit reached, waiting for a slot"
            );
        }

        // The semaphore is never closed, so acquiring only fails if it is
        Arc::clone(semaphore).acquire_owned().await.ok()
    }

    /// Configure socket options using socket2
    fn configure_socket(&self, stream: &TcpStream) {
        let socket = SockRef::from(stream);

        // TCP_NODELAY - disable Nagle's algorithm
        if self.config.nodelay
            && let Err(e) = socket.set_tcp_nodelay(true)
        {
            tracing::warn!(error = %e, "failed to set TCP_NODELAY");
        }

        let keepalive = TcpKeepalive::new().with_time(DEFAULT_KEEPALIVE_INTERVAL);
        if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
            tracing::warn!(error = %e, "failed to set TCP keepalive");
        }
    }
}

// =============================================================================
// Connection Handler
// =============================================================================

/// Why a connection's read loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    PeerClosed,
    IdleTimeout,
    IoError,
    Cancelled,
    QueueClosed,
}

/// Handles a single TCP connection
struct ConnectionHandler {
    config: LineSourceConfig,
    queue: QueueSender,
    metrics: Arc<SourceMetrics>,
    peer_addr: SocketAddr,
    connection_id: u64,
}

impl ConnectionHandler {
    /// Read lines until the connection ends; the admission permit is held
    /// for the whole lifetime of the connection
    async fn handle(
        self,
        stream: TcpStream,
        cancel: CancellationToken,
        _permit: Option<OwnedSemaphorePermit>,
    ) {
        let reason = self.read_loop(stream, &cancel).await;

        self.metrics.connection_closed();

        tracing::debug!(
            peer = %self.peer_addr,
            connection_id = self.connection_id,
            reason = ?reason,
            "connection closed"
        );
    }

    async fn read_loop(&self, stream: TcpStream, cancel: &CancellationToken) -> CloseReason {
        let mut reader = BufReader::with_capacity(self.config.buffer_size, stream);

        // Line buffer (reused across reads), never grows past max_line_size + 1
        let mut line_buf =
            Vec::with_capacity(self.config.buffer_size.min(self.config.max_line_size + 1));

        loop {
            let read_result = tokio::select! {
                biased;

                _ = cancel.cancelled() => return CloseReason::Cancelled,

                read_result = tokio::time::timeout(
                    self.config.idle_timeout,
                    read_bounded_line(&mut reader, &mut line_buf, self.config.max_line_size),
                ) => read_result,
            };

            let bytes_read = match read_result {
                Ok(Ok(ReadLineResult::Line(bytes_read))) => bytes_read,
                Ok(Ok(ReadLineResult::TooLong)) => {
                    self.metrics.line_oversized();
                    tracing::debug!(
                        peer = %self.peer_addr,
                        connection_id = self.connection_id,
                        max = self.config.max_line_size,
                        "line too long, dropped"
                    );
                    continue;
                }
                Ok(Ok(ReadLineResult::Partial(bytes))) => {
                    self.metrics.partial_discarded();
                    tracing::debug!(
                        peer = %self.peer_addr,
                        connection_id = self.connection_id,
                        bytes,
                        "unterminated data at end of stream discarded"
                    );
                    return CloseReason::PeerClosed;
                }
                Ok(Ok(ReadLineResult::Eof)) => return CloseReason::PeerClosed,
                Ok(Err(e)) => {
                    if is_connection_reset(&e) {
                        return CloseReason::PeerClosed;
                    }
                    self.metrics.io_error();
                    tracing::debug!(
                        peer = %self.peer_addr,
                        connection_id = self.connection_id,
                        error = %e,
                        "read error"
                    );
                    return CloseReason::IoError;
                }
                Err(_) => {
                    self.metrics.idle_timeout();
                    return CloseReason::IdleTimeout;
                }
            };

            self.metrics.line_read();

            if line_buf.is_empty() {
                self.metrics.line_empty();
                continue;
            }

            let message = Message::new(self.connection_id, Bytes::copy_from_slice(&line_buf));

            // A full queue parks this connection only; shutdown wins over the wait
            tokio::select! {
                biased;

                result = self.queue.enqueue(message) => {
                    if result.is_err() {
                        self.metrics.message_discarded();
                        return CloseReason::QueueClosed;
                    }
                    self.metrics.message_received(bytes_read as u64);
                }

                _ = cancel.cancelled() => {
                    self.metrics.message_discarded();
                    return CloseReason::Cancelled;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tcp_test.rs"]
mod tcp_test;
