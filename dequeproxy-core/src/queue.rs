//! Admission queue between the acceptor and the worker pool.
//!
//! Connections are appended at the tail with their arrival time, so the
//! sequence is always ordered oldest to newest. Every dequeue first evicts the
//! expired head prefix, then picks an end: the head while the queue is at or
//! below the threshold, the tail once it grows past it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::connection::Connection;
use crate::error::ConfigurationError;
use crate::metrics::{QueueStats, QueueTotals};

/// A connection waiting for a worker
#[derive(Debug)]
pub struct QueuedRequest<C> {
    connection: C,
    enqueued_at: Instant,
}

impl<C> QueuedRequest<C> {
    /// Wrap a connection, stamping it with the current time
    pub fn new(connection: C) -> Self {
        Self { connection, enqueued_at: Instant::now() }
    }

    /// When the connection entered the queue
    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Time spent in queue as of `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }

    /// Whether the connection has waited longer than `timeout`
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        self.age(now) > timeout
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn into_connection(self) -> C {
        self.connection
    }
}

/// Which end of the queue a delivery was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryPolicy {
    /// Oldest first, used while depth <= threshold
    Fifo,
    /// Newest first, used while depth > threshold
    Lifo,
}

impl DeliveryPolicy {
    /// Policy for a queue holding `depth` entries
    pub fn for_depth(depth: usize, threshold: usize) -> Self {
        if depth > threshold {
            Self::Lifo
        } else {
            Self::Fifo
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Lifo => "lifo",
        }
    }
}

impl fmt::Display for DeliveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connection handed to a worker
#[derive(Debug)]
pub struct Delivery<C> {
    /// The connection to service
    pub connection: C,
    /// End of the queue it was taken from
    pub policy: DeliveryPolicy,
    /// Time it spent queued
    pub waited: Duration,
    /// Expired connections evicted by the dequeue call that produced this delivery
    pub evicted: usize,
}

/// Outcome of a blocking dequeue
#[derive(Debug)]
#[must_use]
pub enum Dequeued<C> {
    Delivered(Delivery<C>),
    /// The cancel signal fired while the queue was empty
    Cancelled,
}

impl<C> Dequeued<C> {
    pub fn into_delivery(self) -> Option<Delivery<C>> {
        match self {
            Self::Delivered(delivery) => Some(delivery),
            Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

struct Inner<C> {
    entries: VecDeque<QueuedRequest<C>>,
    totals: QueueTotals,
}

/// Queue of accepted connections with expiry eviction and overload LIFO
///
/// Shared between acceptors and workers behind an `Arc`. All mutations happen
/// under one mutex; blocked workers wait on a [`Notify`] outside it.
pub struct AdmissionQueue<C> {
    config: QueueConfig,
    inner: Mutex<Inner<C>>,
    available: Notify,
    /// Mirror of `entries.len()` for lock-free reads
    depth: AtomicUsize,
    close_failures: AtomicU64,
}

impl<C: Connection> AdmissionQueue<C> {
    /// Create an empty queue, rejecting non-positive limits
    pub fn new(config: QueueConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            inner: Mutex::new(Inner { entries: VecDeque::new(), totals: QueueTotals::default() }),
            available: Notify::new(),
            depth: AtomicUsize::new(0),
            close_failures: AtomicU64::new(0),
        })
    }

    /// Create an empty queue from raw limits
    pub fn with_limits(timeout: Duration, threshold: usize) -> Result<Self, ConfigurationError> {
        Self::new(QueueConfig { timeout, threshold })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Append a connection at the tail and wake one waiting worker
    ///
    /// Never blocks on capacity, never fails and never evicts.
    pub fn enqueue(&self, connection: C) {
        let depth = {
            let mut inner = self.inner.lock();
            // Stamped under the lock so arrival order and timestamp order agree.
            inner.entries.push_back(QueuedRequest::new(connection));
            let depth = inner.entries.len();
            inner.totals.record_enqueued(depth);
            self.depth.store(depth, Ordering::Relaxed);
            depth
        };
        self.available.notify_one();

        debug!(depth, "Connection enqueued");
    }

    /// Wait for the next connection to service
    ///
    /// Evicts expired connections, then takes the head (FIFO) or, when the
    /// queue holds more than `threshold` entries, the tail (LIFO). If the queue
    /// is empty the call waits for an enqueue or for `cancel` to fire.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Dequeued<C> {
        let mut evicted = 0;
        loop {
            let (delivery, expired) = self.take_next();
            evicted += self.close_evicted(expired);

            if let Some(mut delivery) = delivery {
                delivery.evicted = evicted;
                return Dequeued::Delivered(delivery);
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(evicted, "Dequeue cancelled");
                    return Dequeued::Cancelled;
                }
                _ = self.available.notified() => {}
            }
        }
    }

    /// Take the next connection without waiting
    ///
    /// Runs the same eviction and policy selection as [`dequeue`](Self::dequeue).
    pub fn try_dequeue(&self) -> Option<Delivery<C>> {
        let (delivery, expired) = self.take_next();
        let evicted = self.close_evicted(expired);
        delivery.map(|mut delivery| {
            delivery.evicted = evicted;
            delivery
        })
    }

    /// Evict, decide the policy and pop, all in one critical section
    fn take_next(&self) -> (Option<Delivery<C>>, Vec<QueuedRequest<C>>) {
        let (delivery, expired, remaining) = {
            let mut guard = self.inner.lock();
            // Read the clock only once the lock is held so the cutoff is not stale.
            let now = Instant::now();
            let Inner { entries, totals } = &mut *guard;

            let expired = evict_expired(entries, self.config.timeout, now);
            totals.record_evicted(expired.len());

            let policy = DeliveryPolicy::for_depth(entries.len(), self.config.threshold);
            let taken = match policy {
                DeliveryPolicy::Fifo => entries.pop_front(),
                DeliveryPolicy::Lifo => entries.pop_back(),
            };
            let delivery = taken.map(|request| {
                let waited = request.age(now);
                totals.record_delivered(policy, waited);
                Delivery { connection: request.into_connection(), policy, waited, evicted: 0 }
            });

            let remaining = entries.len();
            self.depth.store(remaining, Ordering::Relaxed);
            (delivery, expired, remaining)
        };

        if let Some(delivery) = &delivery {
            debug!(
                policy = %delivery.policy,
                wait_ms = delivery.waited.as_millis() as u64,
                remaining,
                "Connection dequeued"
            );
            // A single stored wakeup can stand for several enqueues; pass it on
            // while work is left.
            if remaining > 0 {
                self.available.notify_one();
            }
        }

        (delivery, expired)
    }

    /// Close evicted connections, logging failures instead of propagating them
    fn close_evicted(&self, expired: Vec<QueuedRequest<C>>) -> usize {
        let count = expired.len();
        if count > 0 {
            info!(evicted = count, "Expired connections ignored");
            self.close_all(expired);
        }
        count
    }

    fn close_all(&self, requests: Vec<QueuedRequest<C>>) {
        for request in requests {
            if let Err(e) = request.into_connection().close() {
                self.close_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Failed to close queued connection");
            }
        }
    }

    /// Remove and close every queued connection
    ///
    /// Used at shutdown once workers have stopped. Returns the number drained.
    pub fn drain(&self) -> usize {
        let drained: Vec<_> = {
            let mut guard = self.inner.lock();
            let Inner { entries, totals } = &mut *guard;
            totals.record_drained(entries.len());
            self.depth.store(0, Ordering::Relaxed);
            entries.drain(..).collect()
        };

        let count = drained.len();
        if count > 0 {
            info!(drained = count, "Closing queued connections");
            self.close_all(drained);
        }
        count
    }

    /// Current depth, not synchronized with in-flight dequeues
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Whether the queue looks empty, not synchronized with in-flight dequeues
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent snapshot of the queue's totals
    pub fn stats(&self) -> QueueStats {
        let guard = self.inner.lock();
        guard
            .totals
            .snapshot(guard.entries.len(), self.close_failures.load(Ordering::Relaxed))
    }
}

/// Split off the maximal head prefix older than `timeout`
///
/// Age never increases toward the tail, so the scan stops at the first entry
/// still within bound.
fn evict_expired<C>(
    entries: &mut VecDeque<QueuedRequest<C>>,
    timeout: Duration,
    now: Instant,
) -> Vec<QueuedRequest<C>> {
    let expired = entries.iter().take_while(|request| request.is_expired(now, timeout)).count();
    entries.drain(..expired).collect()
}
