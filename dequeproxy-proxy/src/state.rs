//! Application state for dequeproxy.

use std::sync::Arc;
use std::time::Instant;

use dequeproxy_core::AdmissionQueue;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;

/// Admission queue holding accepted client sockets
pub type ConnectionQueue = AdmissionQueue<TcpStream>;

/// Application state shared across the admin handlers
pub struct AppState {
    /// Queue between the acceptor and the workers
    pub queue: Arc<ConnectionQueue>,

    /// Configuration
    pub config: ProxyConfig,

    /// Fired when the proxy starts shutting down
    pub shutdown: CancellationToken,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ProxyConfig, queue: Arc<ConnectionQueue>, shutdown: CancellationToken) -> Self {
        Self { queue, config, shutdown, started_at: Instant::now() }
    }
}
