//! Error types for bufcache
//!
//! Only construction-time problems are errors. Runtime contract violations
//! inside the cache (oversized puts, corrupt compressed blocks) panic.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or observing a cache
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration violates a shape constraint
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prometheus registry or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
