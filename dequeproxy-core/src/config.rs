//! Configuration for the admission queue.

use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigurationError;

/// Default time a connection may wait before it is evicted
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);

/// Default queue depth above which delivery switches to LIFO
pub const DEFAULT_THRESHOLD: usize = 10;

/// Limits for an [`AdmissionQueue`](crate::AdmissionQueue)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueConfig {
    /// Maximum time a connection can wait in queue before eviction
    pub timeout: Duration,

    /// Queue depth above which the newest connection is served first
    pub threshold: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, threshold: DEFAULT_THRESHOLD }
    }
}

impl QueueConfig {
    /// Create a config from already typed limits, validating them
    pub fn new(timeout: Duration, threshold: usize) -> Result<Self, ConfigurationError> {
        let config = Self { timeout, threshold };
        config.validate()?;
        Ok(config)
    }

    /// Create a config from signed raw values (CLI flags, environment)
    pub fn from_raw(timeout_ms: i64, threshold: i64) -> Result<Self, ConfigurationError> {
        if timeout_ms <= 0 {
            return Err(ConfigurationError::timeout(timeout_ms));
        }
        if threshold <= 0 {
            return Err(ConfigurationError::threshold(threshold));
        }
        let threshold =
            usize::try_from(threshold).map_err(|_| ConfigurationError::threshold(threshold))?;
        Self::new(Duration::from_millis(timeout_ms as u64), threshold)
    }

    /// Check that both limits are positive
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.timeout.is_zero() {
            return Err(ConfigurationError::timeout(0));
        }
        if self.threshold == 0 {
            return Err(ConfigurationError::threshold(0));
        }
        Ok(())
    }

    /// Timeout in whole milliseconds, saturating
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Create config from environment variables
    ///
    /// Unparsable values are ignored with a warning; parsed values that are not
    /// positive are rejected.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let defaults = Self::default();
        let timeout_ms = env_i64("DEQUEPROXY_QUEUE_TIMEOUT_MS").unwrap_or(defaults.timeout_ms() as i64);
        let threshold = env_i64("DEQUEPROXY_QUEUE_THRESHOLD").unwrap_or(defaults.threshold as i64);
        Self::from_raw(timeout_ms, threshold)
    }
}

fn env_i64(name: &str) -> Option<i64> {
    let val = std::env::var(name).ok()?;
    match val.trim().parse() {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(var = name, value = %val, error = %e, "Ignoring unparsable setting");
            None
        }
    }
}
