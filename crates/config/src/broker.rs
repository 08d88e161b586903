//! Broker client configuration
//!
//! These settings are handed to the broker client unmodified. The relay does
//! not interpret acks, retries, or compression itself.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Acknowledgement level requested from the broker
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub enum Acks {
    /// Fire and forget
    #[serde(rename = "0", alias = "none")]
    None,
    /// Leader-local acknowledgement
    #[default]
    #[serde(rename = "1", alias = "leader")]
    Leader,
    /// All in-sync replicas
    #[serde(rename = "all", alias = "-1")]
    All,
}

impl Acks {
    /// Value for the client's `acks` property
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "0",
            Self::Leader => "1",
            Self::All => "all",
        }
    }
}

/// Payload compression codec
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    #[default]
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    /// Value for the client's `compression.type` property
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Snappy => "snappy",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }
}

/// Broker configuration
///
/// # Example
///
/// ```toml
/// [broker]
/// brokers = ["broker-1:9092", "broker-2:9092"]
/// topic = "topic"
/// client_id = "producer-client"
/// acks = "1"
/// retries = 5
/// compression = "snappy"
/// flush_interval = "500ms"
///
/// [broker.options]
/// "socket.keepalive.enable" = "true"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Bootstrap broker addresses (host:port)
    pub brokers: Vec<String>,

    /// Destination topic for every relayed line
    pub topic: String,

    /// Client identifier reported to the broker
    pub client_id: String,

    /// Acknowledgement level
    /// Default: leader-local ("1")
    pub acks: Acks,

    /// Client-side retries per message before it is reported failed
    /// Default: 5
    pub retries: u32,

    /// Compression codec
    /// Default: snappy
    pub compression: Compression,

    /// How long the client batches messages before sending
    /// Default: 500ms
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Upper bound on a message's delivery time including retries
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub message_timeout: Duration,

    /// How many times `publish` waits for room when the client's local
    /// queue is full before giving up on a message
    /// Default: 10
    pub queue_full_retries: u32,

    /// Wait between queue-full retries
    /// Default: 50ms
    #[serde(with = "humantime_serde")]
    pub queue_full_backoff: Duration,

    /// Fetch topic metadata once, through the first worker's client, failing
    /// startup if the cluster is unreachable
    /// Default: true
    pub verify_on_startup: bool,

    /// Timeout for the startup metadata fetch
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub metadata_timeout: Duration,

    /// Extra client properties passed through verbatim
    pub options: BTreeMap<String, String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".into()],
            topic: "topic".into(),
            client_id: "producer-client".into(),
            acks: Acks::Leader,
            retries: 5,
            compression: Compression::Snappy,
            flush_interval: Duration::from_millis(500),
            message_timeout: Duration::from_secs(30),
            queue_full_retries: 10,
            queue_full_backoff: Duration::from_millis(50),
            verify_on_startup: true,
            metadata_timeout: Duration::from_secs(10),
            options: BTreeMap::new(),
        }
    }
}

impl BrokerConfig {
    /// Comma-separated bootstrap server list
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.bootstrap_servers(), "localhost:9092");
        assert_eq!(config.topic, "topic");
        assert_eq!(config.client_id, "producer-client");
        assert_eq!(config.acks, Acks::Leader);
        assert_eq!(config.retries, 5);
        assert_eq!(config.compression, Compression::Snappy);
        assert_eq!(config.flush_interval, Duration::from_millis(500));
        assert!(config.options.is_empty());
    }

    #[test]
    fn test_acks_values() {
        for (raw, expected) in [
            ("\"0\"", Acks::None),
            ("\"none\"", Acks::None),
            ("\"1\"", Acks::Leader),
            ("\"leader\"", Acks::Leader),
            ("\"all\"", Acks::All),
            ("\"-1\"", Acks::All),
        ] {
            let config: BrokerConfig = toml::from_str(&format!("acks = {raw}")).unwrap();
            assert_eq!(config.acks, expected, "acks = {raw}");
        }
        assert_eq!(Acks::All.as_str(), "all");
        assert_eq!(Acks::Leader.as_str(), "1");
    }

    #[test]
    fn test_compression_values() {
        let config: BrokerConfig = toml::from_str("compression = \"zstd\"").unwrap();
        assert_eq!(config.compression, Compression::Zstd);
        assert_eq!(Compression::Snappy.as_str(), "snappy");
        assert_eq!(Compression::None.as_str(), "none");
    }

    #[test]
    fn test_options_passthrough() {
        let toml = r#"
[options]
"socket.keepalive.enable" = "true"
"batch.num.messages" = "5000"
"#;
        let config: BrokerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.options.len(), 2);
        assert_eq!(config.options["batch.num.messages"], "5000");
    }
}
