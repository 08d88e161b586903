//! Relay Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid config: the relay listens on `0.0.0.0:9000`
//! and publishes to `localhost:9092` topic `topic` with 25 workers.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use relay_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[listener]\nport = 9100").unwrap();
//! assert_eq!(config.listener.port, 9100);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [listener]
//! address = "0.0.0.0"
//! port = 9000
//! idle_timeout = "5s"
//!
//! [queue]
//! capacity = 1000
//!
//! [producer]
//! workers = 25
//! shutdown_grace = "10s"
//!
//! [broker]
//! brokers = ["broker-1:9092", "broker-2:9092"]
//! topic = "topic"
//! client_id = "producer-client"
//! compression = "snappy"
//! flush_interval = "500ms"
//!
//! [log]
//! level = "info"
//! ```

mod broker;
mod error;
mod listener;
mod logging;
mod metrics;
mod producer;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use broker::{Acks, BrokerConfig, Compression};
pub use error::{ConfigError, Result};
pub use listener::{AcceptErrorPolicy, ListenerConfig};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use metrics::{MetricsConfig, MetricsFormat};
pub use producer::{ProducerConfig, QueueConfig};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TCP listener and per-connection framing
    pub listener: ListenerConfig,

    /// Relay queue between connections and producer workers
    pub queue: QueueConfig,

    /// Producer worker pool
    pub producer: ProducerConfig,

    /// Broker client settings
    pub broker: BrokerConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.queue.capacity, 1000);
        assert_eq!(config.producer.workers, 25);
        assert_eq!(config.broker.topic, "topic");
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[listener]
address = "127.0.0.1"
port = 9100
idle_timeout = "2s"
max_line_size = 4096
max_connections = 512
accept_errors = "continue"

[queue]
capacity = 64

[producer]
workers = 4
shutdown_grace = "3s"

[broker]
brokers = ["broker-1:9092", "broker-2:9092"]
topic = "events"
client_id = "relay-1"
acks = "all"
retries = 7
compression = "lz4"
flush_interval = "250ms"

[broker.options]
"queue.buffering.max.messages" = "200000"

[log]
level = "debug"
format = "json"

[metrics]
enabled = false
interval = "30s"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.listener.bind_address(), "127.0.0.1:9100");
        assert_eq!(config.listener.idle_timeout, Duration::from_secs(2));
        assert_eq!(config.listener.max_line_size, 4096);
        assert_eq!(config.listener.max_connections, Some(512));
        assert_eq!(config.listener.accept_errors, AcceptErrorPolicy::Continue);
        assert_eq!(config.queue.capacity, 64);
        assert_eq!(config.producer.workers, 4);
        assert_eq!(config.producer.shutdown_grace, Duration::from_secs(3));
        assert_eq!(config.broker.bootstrap_servers(), "broker-1:9092,broker-2:9092");
        assert_eq!(config.broker.topic, "events");
        assert_eq!(config.broker.acks, Acks::All);
        assert_eq!(config.broker.retries, 7);
        assert_eq!(config.broker.compression, Compression::Lz4);
        assert_eq!(config.broker.flush_interval, Duration::from_millis(250));
        assert_eq!(
            config.broker.options.get("queue.buffering.max.messages"),
            Some(&"200000".to_string())
        );
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let result = Config::from_str("[producer]\nworkers = 0");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[broker]\ntopic = \"from-file\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.broker.topic, "from-file");
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/nonexistent/relay.toml");
        match result {
            Err(ConfigError::IoError { path, .. }) => assert!(path.contains("relay.toml")),
            other => panic!("expected IoError, got {other:?}"),
        }
    }
}
