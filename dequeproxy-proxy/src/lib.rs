//! dequeproxy proxy library
//!
//! TCP proxy that parks accepted connections in an [`AdmissionQueue`] until a
//! worker is free to forward them upstream. Connections that wait too long are
//! dropped, and under overload the newest connection is forwarded first.
//!
//! ```text
//! clients ──► acceptor ──► AdmissionQueue ──► workers ──► upstream
//!                             │
//!                             └── evicts connections older than the timeout
//! ```
//!
//! [`AdmissionQueue`]: dequeproxy_core::AdmissionQueue

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dequeproxy_core::AdmissionQueue;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod acceptor;
pub mod config;
pub mod error;
pub mod forward;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod worker;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use state::{AppState, ConnectionQueue};

/// Initialize Prometheus metrics registry.
/// Should be called once before starting the server.
pub fn init_metrics() {
    if let Err(e) = metrics::register_metrics() {
        warn!("Failed to register Prometheus metrics: {}", e);
    }
}

/// A proxy with its sockets bound, ready to run
pub struct Server {
    config: ProxyConfig,
    queue: Arc<ConnectionQueue>,
    listener: TcpListener,
    admin_listener: Option<TcpListener>,
}

impl Server {
    /// Validate the configuration and bind the proxy and admin sockets
    pub async fn bind(config: ProxyConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(config.workers > 0, "At least one worker is required");

        let queue = AdmissionQueue::new(config.queue)
            .context("Invalid admission queue configuration")?;

        let listener = TcpListener::bind(&config.listen)
            .await
            .with_context(|| format!("Failed to bind proxy listener on {}", config.listen))?;

        let admin_listener = match config.admin_port {
            Some(port) => {
                let addr = format!("0.0.0.0:{}", port);
                let listener = TcpListener::bind(&addr)
                    .await
                    .with_context(|| format!("Failed to bind admin listener on {}", addr))?;
                Some(listener)
            }
            None => None,
        };

        Ok(Self { config, queue: Arc::new(queue), listener, admin_listener })
    }

    /// Address the proxy accepts clients on
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Address of the admin endpoints, if enabled
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn queue(&self) -> Arc<ConnectionQueue> {
        self.queue.clone()
    }

    /// Serve until `shutdown` fires, then stop workers and drain the queue
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        init_metrics();

        let Self { config, queue, listener, admin_listener } = self;
        let local_addr = listener.local_addr()?;

        info!(
            listen = %local_addr,
            upstream = %config.upstream,
            workers = config.workers,
            timeout_ms = config.queue.timeout_ms(),
            threshold = config.queue.threshold,
            "Starting dequeproxy v{}",
            env!("CARGO_PKG_VERSION")
        );

        let forwarder = Arc::new(forward::Forwarder::new(
            config.upstream.clone(),
            config.connect_timeout,
        ));
        let workers =
            worker::spawn_workers(config.workers, queue.clone(), forwarder, shutdown.clone());

        let admin = match admin_listener {
            Some(admin_listener) => {
                info!("Admin endpoints on http://{}", admin_listener.local_addr()?);
                let state = Arc::new(AppState::new(config.clone(), queue.clone(), shutdown.clone()));
                let app = routes::admin_router(state);
                let token = shutdown.clone();
                Some(tokio::spawn(async move {
                    axum::serve(admin_listener, app)
                        .with_graceful_shutdown(async move { token.cancelled().await })
                        .await
                }))
            }
            None => None,
        };

        acceptor::run_acceptor(listener, queue.clone(), shutdown.clone()).await;

        for worker in workers {
            worker.await.context("Worker task failed")?;
        }
        if let Some(admin) = admin {
            admin.await.context("Admin task failed")?.context("Admin server failed")?;
        }

        let drained = queue.drain();
        let stats = queue.stats();
        info!(
            drained,
            delivered = stats.delivered_total(),
            evicted = stats.evicted_total,
            close_failures = stats.close_failures,
            "dequeproxy stopped"
        );

        Ok(())
    }
}

/// Run the proxy until `shutdown` fires.
///
/// # Example
/// ```no_run
/// use dequeproxy_proxy::{run_server, ProxyConfig};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ProxyConfig {
///         listen: "0.0.0.0:8080".to_string(),
///         upstream: "127.0.0.1:3000".to_string(),
///         ..Default::default()
///     };
///     run_server(config, CancellationToken::new()).await
/// }
/// ```
pub async fn run_server(config: ProxyConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    Server::bind(config).await?.run(shutdown).await
}
