//! Kafka publisher
//!
//! One `rdkafka` `ThreadedProducer` per worker. The producer owns a
//! background thread that polls for delivery reports; outcomes are counted
//! in `PublisherMetrics` from the producer context callback.
//!
//! # Configuration mapping
//!
//! | `[broker]` key      | librdkafka property           |
//! |---------------------|-------------------------------|
//! | `brokers`           | `bootstrap.servers`           |
//! | `client_id`         | `client.id`                   |
//! | `acks`              | `acks`                        |
//! | `retries`           | `message.send.max.retries`    |
//! | `compression`       | `compression.type`            |
//! | `flush_interval`    | `linger.ms`                   |
//! | `message_timeout`   | `message.timeout.ms`          |
//! | `options.*`         | passed through verbatim       |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer};
use rdkafka::util::Timeout;

use relay_config::BrokerConfig;

use crate::error::PublishError;
use crate::metrics::PublisherMetrics;
use crate::publisher::{Publisher, PublisherFactory};
use crate::rate_limited_logger::RateLimitedLogger;

/// Build the librdkafka client configuration for one worker
pub fn client_config(config: &BrokerConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", config.bootstrap_servers())
        .set("client.id", &config.client_id)
        .set("acks", config.acks.as_str())
        .set("message.send.max.retries", config.retries.to_string())
        .set("compression.type", config.compression.as_str())
        .set("linger.ms", config.flush_interval.as_millis().to_string())
        .set(
            "message.timeout.ms",
            config.message_timeout.as_millis().to_string(),
        );

    for (key, value) in &config.options {
        client.set(key, value);
    }

    client
}

// =============================================================================
// Delivery reports
// =============================================================================

/// Producer context that counts delivery outcomes
pub struct DeliveryReporter {
    worker_id: usize,
    metrics: Arc<PublisherMetrics>,
    logger: Arc<RateLimitedLogger>,
}

impl ClientContext for DeliveryReporter {}

impl ProducerContext for DeliveryReporter {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        match result {
            Ok(_) => self.metrics.record_delivered(),
            Err((error, message)) => {
                self.metrics.record_delivery_failed();
                let payload = rdkafka::Message::payload(message).unwrap_or_default();
                self.logger.publish_failed(self.worker_id, error, payload);
            }
        }
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Kafka publisher handle owned by one worker
pub struct KafkaPublisher {
    worker_id: usize,
    producer: ThreadedProducer<DeliveryReporter>,
    queue_full_retries: u32,
    queue_full_backoff: Duration,
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
        let mut attempts = 0;

        loop {
            let record = BaseRecord::<(), [u8]>::to(topic).payload(payload.as_ref());

            match self.producer.send(record) {
                Ok(()) => return Ok(()),
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _))
                    if attempts < self.queue_full_retries =>
                {
                    attempts += 1;
                    tracing::debug!(
                        worker_id = self.worker_id,
                        attempts,
                        "kafka producer queue full, backing off"
                    );
                    tokio::time::sleep(self.queue_full_backoff).await;
                }
                Err((error, _)) => return Err(PublishError::Rejected(error.to_string())),
            }
        }
    }

    async fn close(self: Box<Self>, timeout: Duration) -> Result<(), PublishError> {
        let worker_id = self.worker_id;
        let producer = self.producer;

        // flush() blocks, and dropping the producer joins its poll thread
        let flushed = tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| PublishError::Rejected(format!("flush task failed: {e}")))?;

        match flushed {
            Ok(()) => {
                tracing::debug!(worker_id, "kafka producer flushed");
                Ok(())
            }
            Err(e) => Err(PublishError::Rejected(format!("flush failed: {e}"))),
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Creates one `KafkaPublisher` per worker from the `[broker]` section
pub struct KafkaPublisherFactory {
    config: BrokerConfig,
    logger: Arc<RateLimitedLogger>,
}

impl KafkaPublisherFactory {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            logger: Arc::new(RateLimitedLogger::default()),
        }
    }

    /// Fetch topic metadata to prove the brokers are reachable
    async fn verify(
        &self,
        producer: ThreadedProducer<DeliveryReporter>,
    ) -> Result<ThreadedProducer<DeliveryReporter>, PublishError> {
        let topic = self.config.topic.clone();
        let timeout = self.config.metadata_timeout;

        tokio::task::spawn_blocking(move || {
            let metadata = producer
                .client()
                .fetch_metadata(Some(topic.as_str()), Timeout::After(timeout))
                .map_err(|e| PublishError::Init(format!("metadata request failed: {e}")))?;

            let partitions = metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic)
                .map(|t| t.partitions().len())
                .unwrap_or(0);

            tracing::info!(
                topic = %topic,
                brokers = metadata.brokers().len(),
                partitions,
                "kafka brokers reachable"
            );

            Ok(producer)
        })
        .await
        .map_err(|e| PublishError::Init(format!("metadata task failed: {e}")))?
    }
}

#[async_trait]
impl PublisherFactory for KafkaPublisherFactory {
    async fn create(
        &self,
        worker_id: usize,
        metrics: Arc<PublisherMetrics>,
    ) -> Result<Box<dyn Publisher>, PublishError> {
        let context = DeliveryReporter {
            worker_id,
            metrics,
            logger: Arc::clone(&self.logger),
        };

        let producer: ThreadedProducer<DeliveryReporter> = client_config(&self.config)
            .create_with_context(context)
            .map_err(|e| PublishError::Init(e.to_string()))?;

        // One metadata round-trip is enough to prove connectivity
        let producer = if self.config.verify_on_startup && worker_id == 0 {
            self.verify(producer).await?
        } else {
            producer
        };

        Ok(Box::new(KafkaPublisher {
            worker_id,
            producer,
            queue_full_retries: self.config.queue_full_retries,
            queue_full_backoff: self.config.queue_full_backoff,
        }))
    }

    fn name(&self) -> &'static str {
        "kafka"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_config::{Acks, Compression};

    #[test]
    fn test_client_config_mapping() {
        let mut broker = BrokerConfig {
            brokers: vec!["broker-1:9092".into(), "broker-2:9092".into()],
            client_id: "relay-test".into(),
            acks: Acks::All,
            retries: 7,
            compression: Compression::Lz4,
            flush_interval: Duration::from_millis(250),
            message_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        broker
            .options
            .insert("queue.buffering.max.messages".into(), "50000".into());

        let client = client_config(&broker);
        assert_eq!(
            client.get("bootstrap.servers"),
            Some("broker-1:9092,broker-2:9092")
        );
        assert_eq!(client.get("client.id"), Some("relay-test"));
        assert_eq!(client.get("acks"), Some("all"));
        assert_eq!(client.get("message.send.max.retries"), Some("7"));
        assert_eq!(client.get("compression.type"), Some("lz4"));
        assert_eq!(client.get("linger.ms"), Some("250"));
        assert_eq!(client.get("message.timeout.ms"), Some("5000"));
        assert_eq!(client.get("queue.buffering.max.messages"), Some("50000"));
    }

    #[test]
    fn test_options_override_mapped_keys() {
        let mut broker = BrokerConfig::default();
        broker.options.insert("linger.ms".into(), "5".into());

        let client = client_config(&broker);
        assert_eq!(client.get("linger.ms"), Some("5"));
    }

    #[tokio::test]
    async fn test_factory_creates_without_broker_when_not_verifying() {
        // librdkafka connects lazily, so creation succeeds with no broker running
        let factory = KafkaPublisherFactory::new(BrokerConfig {
            brokers: vec!["127.0.0.1:1".into()],
            verify_on_startup: false,
            ..Default::default()
        });

        let publisher = factory
            .create(0, Arc::new(PublisherMetrics::new()))
            .await
            .unwrap();
        publisher.close(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn test_only_first_worker_verifies() {
        let factory = KafkaPublisherFactory::new(BrokerConfig {
            brokers: vec!["127.0.0.1:1".into()],
            verify_on_startup: true,
            metadata_timeout: Duration::from_millis(200),
            ..Default::default()
        });

        let publisher = factory
            .create(1, Arc::new(PublisherMetrics::new()))
            .await
            .unwrap();
        publisher.close(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn test_factory_verification_fails_without_broker() {
        let factory = KafkaPublisherFactory::new(BrokerConfig {
            brokers: vec!["127.0.0.1:1".into()],
            verify_on_startup: true,
            metadata_timeout: Duration::from_millis(200),
            ..Default::default()
        });

        let result = factory.create(0, Arc::new(PublisherMetrics::new())).await;
        assert!(matches!(result, Err(PublishError::Init(_))));
    }
}
