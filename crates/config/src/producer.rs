//! Relay queue and producer pool configuration

use serde::Deserialize;
use std::time::Duration;

/// Relay queue configuration
///
/// ```toml
/// [queue]
/// capacity = 1000
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum messages buffered between connections and producer workers.
    /// Readers wait when the queue is full.
    /// Default: 1000
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Producer worker pool configuration
///
/// ```toml
/// [producer]
/// workers = 25
/// shutdown_grace = "10s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Number of publishing workers, each with its own broker client handle
    /// Default: 25
    pub workers: usize,

    /// How long shutdown waits for workers to drain the queue before
    /// discarding what is left
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            workers: 25,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}
