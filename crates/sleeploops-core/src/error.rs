//! Error types for device signal reads

use std::time::Duration;
use thiserror::Error;

/// Errors a device signal read can report
///
/// These never escape the signal aggregator: every read falls back to its
/// fail-safe default instead.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Signal unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read signal: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed signal value: {0}")]
    Parse(String),

    #[error("Signal read timed out after {0:?}")]
    Timeout(Duration),
}
