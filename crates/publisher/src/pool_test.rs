//! Tests for the producer worker pool

use std::time::Duration;

use relay_metrics::PublisherMetricsProvider;
use relay_pipeline::{Message, QueueSender, relay_queue};
use tokio::time::timeout;

use super::*;
use crate::error::PublishError;
use crate::testing::{Gate, RecordingFactory};

const WAIT: Duration = Duration::from_secs(5);

fn pool_config(workers: usize) -> WorkerPoolConfig {
    WorkerPoolConfig {
        workers,
        topic: "lines".into(),
        shutdown_grace: Duration::from_secs(2),
        close_timeout: Duration::from_millis(100),
        lane_capacity: 16,
    }
}

/// Enqueue each payload as if it came from its own connection
async fn enqueue_all(tx: &QueueSender, payloads: impl IntoIterator<Item = String>) {
    for (connection_id, payload) in payloads.into_iter().enumerate() {
        tx.enqueue(Message::new(connection_id as u64, payload))
            .await
            .unwrap();
    }
}

/// Payloads recorded for one connection prefix, in publish order
fn payloads_with_prefix(factory: &RecordingFactory, prefix: &str) -> Vec<String> {
    factory
        .payloads()
        .into_iter()
        .filter(|p| p.starts_with(prefix))
        .collect()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[test]
fn test_config_from_sections() {
    let producer = relay_config::ProducerConfig {
        workers: 4,
        shutdown_grace: Duration::from_secs(3),
    };
    let broker = relay_config::BrokerConfig {
        topic: "events".into(),
        ..Default::default()
    };

    let config = WorkerPoolConfig::from_config(&producer, &broker);
    assert_eq!(config.workers, 4);
    assert_eq!(config.topic, "events");
    assert_eq!(config.shutdown_grace, Duration::from_secs(3));
    assert_eq!(config.lane_capacity, DEFAULT_LANE_CAPACITY);
}

#[test]
fn test_lane_for_is_stable_per_connection() {
    assert_eq!(lane_for(0, 4), 0);
    assert_eq!(lane_for(5, 4), 1);
    assert_eq!(lane_for(5, 4), lane_for(5, 4));
    assert_eq!(lane_for(u64::MAX, 1), 0);
}

#[tokio::test]
async fn test_zero_workers_rejected() {
    let (_tx, rx) = relay_queue(4);
    let factory = RecordingFactory::new();

    let result = WorkerPool::start(pool_config(0), &factory, rx).await;
    assert!(matches!(result, Err(PoolError::NoWorkers)));
    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn test_all_workers_publish_concurrently() {
    let (tx, rx) = relay_queue(64);
    let gate = Gate::new();
    let factory = RecordingFactory::new().gated(Arc::clone(&gate));

    let pool = WorkerPool::start(pool_config(25), &factory, rx).await.unwrap();
    assert_eq!(pool.worker_count(), 25);

    enqueue_all(&tx, (0..30).map(|i| format!("m{i}"))).await;

    // Every worker holds one message at the gate at the same time
    wait_until(|| gate.in_flight() == 25).await;
    assert_eq!(gate.max_in_flight(), 25);

    gate.open();
    drop(tx);

    let report = pool.shutdown().await;
    assert!(report.drained);
    assert_eq!(report.discarded, 0);

    let mut payloads = factory.payloads();
    payloads.sort();
    let mut expected: Vec<_> = (0..30).map(|i| format!("m{i}")).collect();
    expected.sort();
    assert_eq!(payloads, expected);
    assert_eq!(factory.closed(), 25);
}

#[tokio::test]
async fn test_publish_failure_does_not_stop_worker() {
    let (tx, rx) = relay_queue(16);
    let factory = RecordingFactory::new().reject_when(|payload| payload == b"m1");

    let pool = WorkerPool::start(pool_config(1), &factory, rx).await.unwrap();
    let metrics = pool.metrics_handle();

    enqueue_all(&tx, (0..5).map(|i| format!("m{i}"))).await;
    drop(tx);

    let report = pool.shutdown().await;
    assert!(report.drained);

    // A single worker keeps queue order
    assert_eq!(factory.payloads(), vec!["m0", "m2", "m3", "m4"]);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.published, 4);
    assert_eq!(snapshot.publish_failed, 1);
    assert_eq!(snapshot.delivered, 4);
}

#[tokio::test]
async fn test_init_failure_starts_no_workers() {
    let (tx, rx) = relay_queue(4);
    let factory = RecordingFactory::new().fail_init_at(3);

    tx.enqueue(Message::new(1, "untouched")).await.unwrap();

    let keep = rx.clone();
    let result = WorkerPool::start(pool_config(5), &factory, rx).await;

    match result {
        Err(PoolError::Init { worker_id, source }) => {
            assert_eq!(worker_id, 3);
            assert!(matches!(source, PublishError::Init(_)));
        }
        other => panic!("expected init failure, got {other:?}"),
    }

    // Handles 0..3 were created and then closed; nothing was consumed
    assert_eq!(factory.created(), 3);
    assert_eq!(factory.closed(), 3);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(keep.depth(), 1);
    assert!(factory.records().is_empty());
}

#[tokio::test]
async fn test_shutdown_drains_queued_messages() {
    let (tx, rx) = relay_queue(128);
    let factory = RecordingFactory::new();

    enqueue_all(&tx, (0..100).map(|i| format!("m{i}"))).await;

    let pool = WorkerPool::start(pool_config(4), &factory, rx).await.unwrap();
    drop(tx);

    let report = pool.shutdown().await;
    assert_eq!(
        report,
        ShutdownReport {
            drained: true,
            discarded: 0
        }
    );
    assert_eq!(factory.records().len(), 100);
    assert!(factory.records().iter().all(|r| r.topic == "lines"));
    assert_eq!(factory.closed(), 4);
}

#[tokio::test]
async fn test_shutdown_discards_after_grace() {
    let (tx, rx) = relay_queue(16);
    let gate = Gate::new();
    let factory = RecordingFactory::new().gated(Arc::clone(&gate));

    let config = WorkerPoolConfig {
        shutdown_grace: Duration::from_millis(100),
        ..pool_config(2)
    };
    let pool = WorkerPool::start(config, &factory, rx).await.unwrap();
    let metrics = pool.metrics_handle();

    enqueue_all(&tx, (0..6).map(|i| format!("m{i}"))).await;
    wait_until(|| gate.in_flight() == 2).await;
    drop(tx);

    // The gate never opens: two messages are stuck in workers, four queued
    let report = pool.shutdown().await;
    assert!(!report.drained);
    assert_eq!(report.discarded, 4);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.discarded, 4);
    assert_eq!(snapshot.workers_active, 0);
    assert!(factory.records().is_empty());
}

#[tokio::test]
async fn test_workers_active_tracking() {
    let (tx, rx) = relay_queue(4);
    let factory = RecordingFactory::new();

    let pool = WorkerPool::start(pool_config(3), &factory, rx).await.unwrap();
    let metrics = pool.metrics_handle();

    wait_until(|| metrics.snapshot().workers_active == 3).await;
    assert_eq!(metrics.snapshot().workers, 3);

    drop(tx);
    assert!(pool.shutdown().await.drained);
    assert_eq!(metrics.snapshot().workers_active, 0);
}

#[tokio::test]
async fn test_one_connection_keeps_order_across_workers() {
    let (tx, rx) = relay_queue(16);
    // The first line stalls; a free worker must not overtake it
    let factory = RecordingFactory::new().delay_when(|payload| {
        (payload == b"line-0").then_some(Duration::from_millis(100))
    });

    let pool = WorkerPool::start(pool_config(2), &factory, rx).await.unwrap();

    for i in 0..10 {
        tx.enqueue(Message::new(7, format!("line-{i}"))).await.unwrap();
    }
    drop(tx);

    assert!(pool.shutdown().await.drained);

    let expected: Vec<_> = (0..10).map(|i| format!("line-{i}")).collect();
    assert_eq!(factory.payloads(), expected);

    // Every line went through the same worker
    let records = factory.records();
    assert!(records.iter().all(|r| r.worker_id == records[0].worker_id));
}

#[tokio::test]
async fn test_interleaved_connections_keep_their_own_order() {
    let (tx, rx) = relay_queue(64);
    let factory = RecordingFactory::new().delay_when(|payload| {
        payload
            .ends_with(b"-0")
            .then_some(Duration::from_millis(50))
    });

    let pool = WorkerPool::start(pool_config(4), &factory, rx).await.unwrap();

    for i in 0..10 {
        for connection_id in 1..=3u64 {
            tx.enqueue(Message::new(connection_id, format!("c{connection_id}-{i}")))
                .await
                .unwrap();
        }
    }
    drop(tx);

    assert!(pool.shutdown().await.drained);
    assert_eq!(factory.records().len(), 30);

    for connection_id in 1..=3 {
        let expected: Vec<_> = (0..10).map(|i| format!("c{connection_id}-{i}")).collect();
        assert_eq!(
            payloads_with_prefix(&factory, &format!("c{connection_id}-")),
            expected
        );
    }
}

#[tokio::test]
async fn test_full_lane_backs_up_into_relay_queue() {
    let (tx, rx) = relay_queue(2);
    let gate = Gate::new();
    let factory = RecordingFactory::new().gated(Arc::clone(&gate));

    let queue = rx.clone();
    let config = WorkerPoolConfig {
        lane_capacity: 1,
        ..pool_config(1)
    };
    let pool = WorkerPool::start(config, &factory, rx).await.unwrap();

    // One at the gate, one in the lane, one held by the dispatcher, two queued
    enqueue_all(&tx, (0..5).map(|i| format!("m{i}"))).await;
    wait_until(|| gate.in_flight() == 1 && queue.depth() == 2).await;

    let blocked = {
        let tx = tx.clone();
        tokio::spawn(async move { tx.enqueue(Message::new(9, "m5")).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!blocked.is_finished());

    gate.open();
    timeout(WAIT, blocked).await.unwrap().unwrap().unwrap();
    drop(tx);

    assert!(pool.shutdown().await.drained);
    assert_eq!(factory.payloads(), vec!["m0", "m1", "m2", "m3", "m4", "m5"]);
}
