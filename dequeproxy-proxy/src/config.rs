//! Proxy configuration.

use std::time::Duration;

use dequeproxy_core::{ConfigurationError, QueueConfig};

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address client connections are accepted on
    pub listen: String,

    /// Address connections are forwarded to
    pub upstream: String,

    /// Number of worker tasks pulling from the admission queue
    pub workers: usize,

    /// Admin HTTP port, `None` to disable the admin endpoints
    pub admin_port: Option<u16>,

    /// Maximum time to establish the upstream connection
    pub connect_timeout: Duration,

    /// Admission queue limits
    pub queue: QueueConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            upstream: "127.0.0.1:8000".to_string(),
            workers: 4,
            admin_port: Some(9090),
            connect_timeout: Duration::from_secs(5),
            queue: QueueConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Create config from environment variables
    ///
    /// Queue limits are validated here, so a non-positive timeout or threshold
    /// fails startup.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let mut config = Self { queue: QueueConfig::from_env()?, ..Self::default() };

        if let Ok(val) = std::env::var("DEQUEPROXY_LISTEN") {
            config.listen = val;
        }

        if let Ok(val) = std::env::var("DEQUEPROXY_UPSTREAM") {
            config.upstream = val;
        }

        if let Ok(val) = std::env::var("DEQUEPROXY_WORKERS") {
            if let Ok(n) = val.parse() {
                config.workers = n;
            }
        }

        if let Ok(val) = std::env::var("DEQUEPROXY_ADMIN_PORT") {
            config.admin_port = parse_admin_port(&val).unwrap_or(config.admin_port);
        }

        if let Ok(val) = std::env::var("DEQUEPROXY_CONNECT_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                config.connect_timeout = Duration::from_millis(n);
            }
        }

        Ok(config)
    }
}

/// Parse an admin port setting, where `off` or `none` disables the endpoints
pub fn parse_admin_port(val: &str) -> Option<Option<u16>> {
    match val.trim().to_lowercase().as_str() {
        "off" | "none" | "disabled" => Some(None),
        other => other.parse().ok().map(Some),
    }
}
