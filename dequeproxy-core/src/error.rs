//! Error types for the dequeproxy core library
//!
//! # Error Hierarchy
//!
//! ```text
//! ConfigurationError  - invalid queue limits, fatal at startup
//! CloseError          - a queued handle failed to close, logged and skipped
//! ```
//!
//! A cancelled dequeue is not an error: it is reported through
//! [`Dequeued::Cancelled`](crate::Dequeued::Cancelled).
//!
//! Application code should wrap these with `anyhow` context:
//!
//! ```rust,ignore
//! use anyhow::Context;
//!
//! let queue = AdmissionQueue::new(config)
//!     .context("Invalid admission queue configuration")?;
//! ```

use std::io;

use thiserror::Error;

/// Errors raised while validating queue limits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Timeout was zero or negative
    #[error("Timeout should be positive, {given_ms}ms given")]
    NonPositiveTimeout { given_ms: i64 },

    /// Threshold was zero or negative
    #[error("Threshold should be positive, {given} given")]
    NonPositiveThreshold { given: i64 },
}

impl ConfigurationError {
    /// Create a timeout validation error
    pub fn timeout(given_ms: i64) -> Self {
        Self::NonPositiveTimeout { given_ms }
    }

    /// Create a threshold validation error
    pub fn threshold(given: i64) -> Self {
        Self::NonPositiveThreshold { given }
    }
}

/// A connection handle could not be closed cleanly
#[derive(Error, Debug)]
#[error("Failed to close connection: {source}")]
pub struct CloseError {
    #[from]
    source: io::Error,
}

impl CloseError {
    /// Underlying I/O failure
    pub fn io_error(&self) -> &io::Error {
        &self.source
    }

    /// Kind of the underlying I/O failure
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}
