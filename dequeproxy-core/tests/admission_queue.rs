//! End-to-end behavior of the admission queue
//!
//! These tests drive the public API the way the proxy does:
//! - mixed FIFO / LIFO delivery as load crosses the threshold
//! - lazy eviction of connections left waiting past the timeout
//! - workers blocked on an empty queue

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dequeproxy_core::{
    AdmissionQueue, CloseError, ConfigurationError, Connection, DeliveryPolicy, QueueConfig,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Handle {
    name: String,
    closed: Arc<AtomicUsize>,
}

impl Connection for Handle {
    fn close(self) -> Result<(), CloseError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn handle(name: impl Into<String>, closed: &Arc<AtomicUsize>) -> Handle {
    Handle { name: name.into(), closed: closed.clone() }
}

/// Construction rejects every non-positive limit
#[test]
fn test_construct_rejects_invalid_limits() {
    for (timeout_ms, threshold) in [(0, 10), (-1, 10), (2500, 0), (2500, -10), (0, 0)] {
        let result = QueueConfig::from_raw(timeout_ms, threshold);
        assert!(
            matches!(
                result,
                Err(ConfigurationError::NonPositiveTimeout { .. })
                    | Err(ConfigurationError::NonPositiveThreshold { .. })
            ),
            "({timeout_ms}, {threshold}) should be rejected"
        );
    }

    let config = QueueConfig { timeout: Duration::ZERO, threshold: 10 };
    assert!(AdmissionQueue::<Handle>::new(config).is_err());
}

/// Timeout 2500ms, threshold 10: FIFO, then LIFO under load, then eviction
#[tokio::test(start_paused = true)]
async fn test_overload_scenario() {
    let queue = Arc::new(AdmissionQueue::new(QueueConfig::default()).unwrap());
    let closed = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();

    for name in ["A", "B", "C", "D", "E"] {
        queue.enqueue(handle(name, &closed));
    }
    let first = queue.dequeue(&cancel).await.into_delivery().unwrap();
    assert_eq!(first.connection.name, "A");
    assert_eq!(first.policy, DeliveryPolicy::Fifo);

    for i in 1..=15 {
        queue.enqueue(handle(format!("burst-{i}"), &closed));
    }
    let newest = queue.dequeue(&cancel).await.into_delivery().unwrap();
    assert_eq!(newest.connection.name, "burst-15");
    assert_eq!(newest.policy, DeliveryPolicy::Lifo);

    // Clear the backlog so a single connection is left waiting.
    while queue.try_dequeue().is_some() {}
    assert!(queue.is_empty());

    queue.enqueue(handle("stale", &closed));
    tokio::time::advance(Duration::from_millis(3000)).await;

    let worker = {
        let queue = queue.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { queue.dequeue(&cancel).await })
    };

    while queue.stats().evicted_total == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(closed.load(Ordering::SeqCst), 1, "stale handle should be closed");
    assert!(!worker.is_finished(), "worker should block after eviction");

    queue.enqueue(handle("fresh", &closed));
    let delivery = worker.await.unwrap().into_delivery().unwrap();
    assert_eq!(delivery.connection.name, "fresh");
    assert_eq!(delivery.evicted, 1);

    let stats = queue.stats();
    assert_eq!(stats.evicted_total, 1);
    assert_eq!(stats.remaining, 0);
    assert!(stats.is_conserved());
}

/// Eviction count equals the contiguous expired head, no more
#[tokio::test(start_paused = true)]
async fn test_eviction_count_matches_expired_prefix() {
    let queue = AdmissionQueue::with_limits(Duration::from_millis(500), 100).unwrap();
    let closed = Arc::new(AtomicUsize::new(0));

    for i in 0..4 {
        queue.enqueue(handle(format!("old-{i}"), &closed));
    }
    tokio::time::advance(Duration::from_millis(400)).await;
    for i in 0..3 {
        queue.enqueue(handle(format!("young-{i}"), &closed));
    }
    tokio::time::advance(Duration::from_millis(200)).await;

    let delivery = queue.try_dequeue().unwrap();
    assert_eq!(delivery.evicted, 4);
    assert_eq!(delivery.connection.name, "young-0");
    assert_eq!(closed.load(Ordering::SeqCst), 4);
    assert_eq!(queue.len(), 2);
}

/// A blocked dequeue returns exactly the next enqueued item
#[tokio::test]
async fn test_blocked_dequeue_receives_next_enqueue() {
    let queue = Arc::new(AdmissionQueue::with_limits(Duration::from_secs(30), 4).unwrap());
    let closed = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();

    let worker = {
        let queue = queue.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { queue.dequeue(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    queue.enqueue(handle("only", &closed));
    let delivery = worker.await.unwrap().into_delivery().unwrap();
    assert_eq!(delivery.connection.name, "only");
    assert_eq!(delivery.evicted, 0);
}
