//! Worker pool draining the admission queue.

use std::sync::Arc;

use dequeproxy_core::Dequeued;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::forward::Forwarder;
use crate::metrics::{self, ConnectionTimer};
use crate::state::ConnectionQueue;

/// Start `count` workers sharing one queue and forwarder
pub fn spawn_workers(
    count: usize,
    queue: Arc<ConnectionQueue>,
    forwarder: Arc<Forwarder>,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| {
            tokio::spawn(run_worker(id, queue.clone(), forwarder.clone(), shutdown.clone()))
        })
        .collect()
}

/// Service delivered connections until the queue reports cancellation
///
/// A connection still being forwarded when `shutdown` fires is dropped and
/// counted as interrupted rather than failed.
pub async fn run_worker(
    id: usize,
    queue: Arc<ConnectionQueue>,
    forwarder: Arc<Forwarder>,
    shutdown: CancellationToken,
) {
    debug!(worker = id, "Worker started");

    while !shutdown.is_cancelled() {
        let delivery = match queue.dequeue(&shutdown).await {
            Dequeued::Delivered(delivery) => delivery,
            Dequeued::Cancelled => break,
        };

        metrics::record_delivery(delivery.policy, delivery.waited);
        metrics::record_evicted(delivery.evicted);
        metrics::set_queue_size(queue.len());
        debug!(
            worker = id,
            policy = %delivery.policy,
            wait_ms = delivery.waited.as_millis() as u64,
            evicted = delivery.evicted,
            "Servicing connection"
        );

        let timer = ConnectionTimer::new();
        tokio::select! {
            result = forwarder.forward(delivery.connection) => match result {
                Ok((sent, received)) => {
                    debug!(
                        worker = id,
                        sent,
                        received,
                        duration_ms = timer.elapsed().as_millis() as u64,
                        "Connection closed"
                    );
                    timer.record_success();
                }
                Err(e) => {
                    warn!(worker = id, error = %e, "Forwarding failed");
                    timer.record_failure();
                }
            },
            _ = shutdown.cancelled() => {
                debug!(worker = id, "Dropping in-flight connection");
                timer.record_interrupted();
            }
        }
    }

    debug!(worker = id, "Worker stopped");
}
