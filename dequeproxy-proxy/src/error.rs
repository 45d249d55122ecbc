//! Error types for the dequeproxy proxy.

use std::io;
use std::time::Duration;

/// Proxy error types
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Failed to connect to the upstream
    #[error("Failed to connect to upstream {upstream}: {source}")]
    UpstreamConnection {
        upstream: String,
        #[source]
        source: io::Error,
    },

    /// Upstream did not accept the connection in time
    #[error("Timed out connecting to upstream {upstream} after {timeout:?}")]
    UpstreamTimeout { upstream: String, timeout: Duration },

    /// Copying bytes between client and upstream failed
    #[error("Forwarding error: {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// Whether the upstream was never reached
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(self, Self::UpstreamConnection { .. } | Self::UpstreamTimeout { .. })
    }
}
