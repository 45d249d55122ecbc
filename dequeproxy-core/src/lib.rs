//! dequeproxy core library
//!
//! An admission queue that buffers accepted connections between an acceptor
//! and a pool of workers. Connections that wait longer than the configured
//! timeout are evicted and closed the next time a worker asks for work, and
//! once the queue holds more than `threshold` entries the newest connection is
//! served first so at least some clients stay within their deadline.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dequeproxy_core::{AdmissionQueue, Dequeued, QueueConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let queue = Arc::new(AdmissionQueue::new(QueueConfig::default())?);
//! let shutdown = CancellationToken::new();
//!
//! queue.enqueue(stream);
//! match queue.dequeue(&shutdown).await {
//!     Dequeued::Delivered(delivery) => serve(delivery.connection).await,
//!     Dequeued::Cancelled => return Ok(()),
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod queue;

pub use config::{QueueConfig, DEFAULT_THRESHOLD, DEFAULT_TIMEOUT};
pub use connection::Connection;
pub use error::{CloseError, ConfigurationError};
pub use metrics::QueueStats;
pub use queue::{AdmissionQueue, Delivery, DeliveryPolicy, Dequeued, QueuedRequest};
