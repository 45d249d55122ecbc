//! Accept loop feeding the admission queue.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::state::ConnectionQueue;

/// Accept client connections and enqueue them until `shutdown` fires
///
/// Accept errors (for example running out of file descriptors) are logged and
/// the loop keeps going.
pub async fn run_acceptor(
    listener: TcpListener,
    queue: Arc<ConnectionQueue>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    queue.enqueue(stream);
                    metrics::record_accepted();
                    metrics::set_queue_size(queue.len());
                    debug!(%peer, depth = queue.len(), "Accepted connection");
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            },
        }
    }
    info!("Acceptor stopped");
}
