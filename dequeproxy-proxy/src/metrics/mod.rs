//! Metrics module for dequeproxy
//!
//! Provides Prometheus metrics for monitoring and observability.

pub mod prometheus;

// Re-export commonly used items
pub use self::prometheus::{
    encode_metrics, observe_queue, record_accepted, record_delivery, record_evicted,
    register_metrics, set_queue_size, ConnectionTimer,
};
