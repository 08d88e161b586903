//! Listener configuration
//!
//! Settings for the TCP acceptor and the per-connection line reader.

use serde::Deserialize;
use std::time::Duration;

/// What the acceptor does when `accept()` fails on a bound listener
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AcceptErrorPolicy {
    /// Stop the acceptor and shut the relay down with an error
    #[default]
    Fatal,
    /// Log, back off briefly, and keep accepting
    Continue,
}

/// TCP listener configuration
///
/// # Example
///
/// ```toml
/// [listener]
/// address = "0.0.0.0"
/// port = 9000
/// idle_timeout = "5s"
/// max_line_size = 1048576
/// max_connections = 10000
/// accept_errors = "fatal"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address
    /// Default: "0.0.0.0"
    pub address: String,

    /// Listen port
    /// Default: 9000
    pub port: u16,

    /// Maximum time a single line read may take before the connection is closed.
    /// Measured from the start of each read, not from connection open.
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Longest accepted line in bytes, delimiter excluded.
    /// Longer lines are consumed and dropped.
    /// Default: 1 MiB
    pub max_line_size: usize,

    /// Read buffer size per connection (bytes)
    /// Default: 64 KiB
    pub buffer_size: usize,

    /// Admission limit on concurrently served connections.
    /// Default: unlimited
    pub max_connections: Option<usize>,

    /// Accept error policy
    /// Default: fatal
    pub accept_errors: AcceptErrorPolicy,

    /// Enable TCP_NODELAY on accepted sockets
    /// Default: true
    pub nodelay: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: 9000,
            idle_timeout: Duration::from_secs(5),
            max_line_size: 1024 * 1024,
            buffer_size: 64 * 1024,
            max_connections: None,
            accept_errors: AcceptErrorPolicy::Fatal,
            nodelay: true,
        }
    }
}

impl ListenerConfig {
    /// Socket address string to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
