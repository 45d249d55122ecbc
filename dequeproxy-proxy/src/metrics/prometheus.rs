//! Prometheus metrics for dequeproxy
//!
//! Exposes metrics in Prometheus format for monitoring and observability.

use dequeproxy_core::{DeliveryPolicy, QueueStats};
use lazy_static::lazy_static;
use prometheus::{
    Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry for dequeproxy metrics
    pub static ref REGISTRY: Registry = Registry::new();

    // ============== Queue Metrics ==============

    /// Current queue size gauge
    pub static ref QUEUE_SIZE: IntGauge = IntGauge::with_opts(
        Opts::new("queue_size", "Current number of connections waiting in queue")
            .namespace("dequeproxy")
    ).expect("metric can be created");

    /// Queue wait time histogram
    pub static ref QUEUE_WAIT_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "queue_wait_seconds",
            "Time a delivered connection spent waiting in queue"
        )
        .namespace("dequeproxy")
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).expect("metric can be created");

    /// Evicted or drained connections whose close failed
    pub static ref QUEUE_CLOSE_FAILURES: IntGauge = IntGauge::with_opts(
        Opts::new("queue_close_failures", "Queued connections that failed to close since start")
            .namespace("dequeproxy")
    ).expect("metric can be created");

    /// Deepest the queue has been
    pub static ref QUEUE_MAX_DEPTH: IntGauge = IntGauge::with_opts(
        Opts::new("queue_max_depth", "Maximum queue depth observed")
            .namespace("dequeproxy")
    ).expect("metric can be created");

    // ============== Connection Metrics ==============

    /// Connections accepted from clients
    pub static ref CONNECTIONS_ACCEPTED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("connections_accepted_total", "Total client connections accepted")
            .namespace("dequeproxy")
    ).expect("metric can be created");

    /// Connections handed to workers, by delivery policy
    pub static ref CONNECTIONS_DELIVERED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("connections_delivered_total", "Total connections delivered to workers")
            .namespace("dequeproxy"),
        &["policy"]
    ).expect("metric can be created");

    /// Connections closed because they waited past the queue timeout
    pub static ref CONNECTIONS_EVICTED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("connections_evicted_total", "Total queued connections evicted as expired")
            .namespace("dequeproxy")
    ).expect("metric can be created");

    /// Connections whose forwarding failed
    pub static ref FORWARD_ERRORS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("forward_errors_total", "Total connections that failed while forwarding")
            .namespace("dequeproxy")
    ).expect("metric can be created");

    /// Connections cut off mid-forward by shutdown
    pub static ref CONNECTIONS_INTERRUPTED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("connections_interrupted_total", "Total connections dropped mid-forward at shutdown")
            .namespace("dequeproxy")
    ).expect("metric can be created");

    /// Connections currently being forwarded
    pub static ref ACTIVE_CONNECTIONS: Gauge = Gauge::with_opts(
        Opts::new("active_connections", "Number of connections currently being forwarded")
            .namespace("dequeproxy")
    ).expect("metric can be created");
}

/// Register all metrics with the global registry.
/// Should be called once at startup.
pub fn register_metrics() -> prometheus::Result<()> {
    // Queue metrics
    REGISTRY.register(Box::new(QUEUE_SIZE.clone()))?;
    REGISTRY.register(Box::new(QUEUE_WAIT_SECONDS.clone()))?;
    REGISTRY.register(Box::new(QUEUE_CLOSE_FAILURES.clone()))?;
    REGISTRY.register(Box::new(QUEUE_MAX_DEPTH.clone()))?;

    // Connection metrics
    REGISTRY.register(Box::new(CONNECTIONS_ACCEPTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONNECTIONS_DELIVERED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONNECTIONS_EVICTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FORWARD_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONNECTIONS_INTERRUPTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACTIVE_CONNECTIONS.clone()))?;

    Ok(())
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| format!("# Error encoding metrics: {}", e))
}

/// Tracks a connection while it is being forwarded.
/// Counts it as failed if dropped without an explicit record.
pub struct ConnectionTimer {
    start: std::time::Instant,
}

impl ConnectionTimer {
    pub fn new() -> Self {
        ACTIVE_CONNECTIONS.inc();
        Self { start: std::time::Instant::now() }
    }

    /// Time since forwarding started
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    /// Record a connection that was relayed until close.
    pub fn record_success(self) {
        ACTIVE_CONNECTIONS.dec();
        // Prevent the Drop impl from running
        std::mem::forget(self);
    }

    /// Record a connection that failed while forwarding.
    pub fn record_failure(self) {
        ACTIVE_CONNECTIONS.dec();
        FORWARD_ERRORS_TOTAL.inc();
        std::mem::forget(self);
    }

    /// Record a connection abandoned because the proxy is shutting down.
    /// Not a forwarding error.
    pub fn record_interrupted(self) {
        ACTIVE_CONNECTIONS.dec();
        CONNECTIONS_INTERRUPTED_TOTAL.inc();
        std::mem::forget(self);
    }
}

impl Default for ConnectionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionTimer {
    fn drop(&mut self) {
        ACTIVE_CONNECTIONS.dec();
        FORWARD_ERRORS_TOTAL.inc();
    }
}

/// Record an accepted connection.
pub fn record_accepted() {
    CONNECTIONS_ACCEPTED_TOTAL.inc();
}

/// Record a delivery from the queue.
pub fn record_delivery(policy: DeliveryPolicy, waited: std::time::Duration) {
    CONNECTIONS_DELIVERED_TOTAL.with_label_values(&[policy.as_str()]).inc();
    QUEUE_WAIT_SECONDS.observe(waited.as_secs_f64());
}

/// Record connections evicted from the queue as expired.
pub fn record_evicted(count: usize) {
    CONNECTIONS_EVICTED_TOTAL.inc_by(count as u64);
}

/// Update queue size gauge.
pub fn set_queue_size(size: usize) {
    QUEUE_SIZE.set(size as i64);
}

/// Mirror the queue's own totals into the registry.
pub fn observe_queue(stats: &QueueStats) {
    QUEUE_SIZE.set(stats.remaining as i64);
    QUEUE_CLOSE_FAILURES.set(stats.close_failures as i64);
    QUEUE_MAX_DEPTH.set(stats.max_depth as i64);
}

/// Serializes tests that assert on `FORWARD_ERRORS_TOTAL`.
#[cfg(test)]
pub(crate) static FORWARD_ERRORS_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
