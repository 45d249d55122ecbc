//! dequeproxy - TCP proxy with a freshness-aware admission queue.
//!
//! Accepted connections wait in a queue until a worker is free. Connections
//! older than the queue timeout are closed, and once more than `threshold`
//! connections are waiting the newest one is served first.
//!
//! ## Quick Start
//!
//! ```bash
//! # Forward :8080 to a local service on :3000
//! dequeproxy --upstream 127.0.0.1:3000
//!
//! # Tighter queue limits via environment
//! DEQUEPROXY_QUEUE_TIMEOUT_MS=1000 DEQUEPROXY_QUEUE_THRESHOLD=32 dequeproxy
//! ```

use anyhow::Context;
use clap::Parser;
use dequeproxy_core::QueueConfig;
use dequeproxy_proxy::{run_server, ProxyConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "dequeproxy")]
#[command(version)]
#[command(about = "TCP proxy with a freshness-aware admission queue", long_about = None)]
struct Cli {
    /// Address to accept client connections on
    #[arg(short, long)]
    listen: Option<String>,

    /// Upstream address connections are forwarded to
    #[arg(short, long)]
    upstream: Option<String>,

    /// Number of worker tasks
    #[arg(short, long)]
    workers: Option<usize>,

    /// Time a connection may wait in queue, in milliseconds
    #[arg(long, allow_negative_numbers = true)]
    timeout_ms: Option<i64>,

    /// Queue depth above which the newest connection is served first
    #[arg(long, allow_negative_numbers = true)]
    threshold: Option<i64>,

    /// Port for the admin HTTP endpoints
    #[arg(long)]
    admin_port: Option<u16>,

    /// Disable the admin HTTP endpoints
    #[arg(long, conflicts_with = "admin_port")]
    no_admin: bool,
}

impl Cli {
    /// Overlay command-line flags on a base configuration
    fn apply(self, mut config: ProxyConfig) -> anyhow::Result<ProxyConfig> {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(upstream) = self.upstream {
            config.upstream = upstream;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.timeout_ms.is_some() || self.threshold.is_some() {
            let timeout_ms = self.timeout_ms.unwrap_or(config.queue.timeout_ms() as i64);
            let threshold = self.threshold.unwrap_or(config.queue.threshold as i64);
            config.queue = QueueConfig::from_raw(timeout_ms, threshold)
                .context("Invalid admission queue configuration")?;
        }
        if self.no_admin {
            config.admin_port = None;
        } else if let Some(port) = self.admin_port {
            config.admin_port = Some(port);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("dequeproxy_proxy=info,dequeproxy_core=info,tower_http=info")
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load configuration
    let cli = Cli::parse();
    let config = ProxyConfig::from_env().context("Invalid environment configuration")?;
    let config = cli.apply(config)?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal_token.cancel();
    });

    run_server(config, shutdown).await
}
