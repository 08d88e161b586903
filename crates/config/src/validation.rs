//! Configuration validation
//!
//! Rejects values that would make the relay unable to run:
//! - empty topic or broker list
//! - zero workers, zero queue capacity, zero admission limit
//! - zero idle timeout or maximum line size

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_listener(config)?;
    validate_pipeline(config)?;
    validate_broker(config)?;
    Ok(())
}

fn validate_listener(config: &Config) -> Result<()> {
    let listener = &config.listener;

    if listener.address.trim().is_empty() {
        return Err(ConfigError::missing_field("listener", "address"));
    }
    if listener.idle_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "listener",
            "idle_timeout",
            "must be greater than zero",
        ));
    }
    if listener.max_line_size == 0 {
        return Err(ConfigError::invalid_value(
            "listener",
            "max_line_size",
            "must be at least 1 byte",
        ));
    }
    if listener.buffer_size == 0 {
        return Err(ConfigError::invalid_value(
            "listener",
            "buffer_size",
            "must be at least 1 byte",
        ));
    }
    if listener.max_connections == Some(0) {
        return Err(ConfigError::invalid_value(
            "listener",
            "max_connections",
            "must be at least 1 when set",
        ));
    }
    Ok(())
}

fn validate_pipeline(config: &Config) -> Result<()> {
    if config.queue.capacity == 0 {
        return Err(ConfigError::invalid_value(
            "queue",
            "capacity",
            "must be at least 1",
        ));
    }
    if config.producer.workers == 0 {
        return Err(ConfigError::invalid_value(
            "producer",
            "workers",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn validate_broker(config: &Config) -> Result<()> {
    let broker = &config.broker;

    if broker.topic.trim().is_empty() {
        return Err(ConfigError::missing_field("broker", "topic"));
    }
    if broker.brokers.is_empty() {
        return Err(ConfigError::missing_field("broker", "brokers"));
    }
    if let Some(empty) = broker.brokers.iter().position(|b| b.trim().is_empty()) {
        return Err(ConfigError::invalid_value(
            "broker",
            "brokers",
            format!("entry {empty} is empty"),
        ));
    }
    Ok(())
}
