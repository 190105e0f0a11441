//! Per-attempt fragment error type for retry classification.

use std::io;
use thiserror::Error;

use crate::transport::TransportError;

/// Why one fetch attempt for one fragment did not produce a persisted file.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// No response (timeout, connection reset, DNS, ...).
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Response status other than 200/206.
    #[error("HTTP {0}")]
    Status(u32),
    /// 200/206 but the body is below the minimum size; usually an HTML error page.
    #[error("payload too small: {size} bytes (minimum {min})")]
    Undersized { size: u64, min: u64 },
    /// Local disk write failed (disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[source] io::Error),
}
