//! Metrics reporting configuration
//!
//! The relay periodically logs counters for the listener, the relay queue,
//! and the producer pool. Reporting is on by default every 60 seconds.

use serde::Deserialize;
use std::time::Duration;

/// Metrics output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    /// One human-readable line per component
    #[default]
    Human,
    /// One JSON document per report
    Json,
}

/// Metrics configuration
///
/// ```toml
/// [metrics]
/// enabled = true
/// interval = "60s"
/// format = "human"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable periodic reporting
    pub enabled: bool,

    /// Reporting interval
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Output format
    pub format: MetricsFormat,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            format: MetricsFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.format, MetricsFormat::Human);
    }

    #[test]
    fn test_deserialize() {
        let toml = r#"
enabled = true
interval = "15s"
format = "json"
"#;
        let config: MetricsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.format, MetricsFormat::Json);
    }
}
