//! Payload acceptance before a fragment is persisted.
//!
//! Only the status code and a minimum size are checked. Servers that hand out
//! a small HTML error page with status 200 are the case the size floor exists
//! for; nothing here looks at the container or hashes the bytes.

use crate::retry::FragmentError;

/// Minimum payload size used when no configuration is supplied.
pub const DEFAULT_MIN_PAYLOAD_BYTES: u64 = 300;

/// Accepts `200 OK` and `206 Partial Content`.
pub fn is_accepted_status(status: u32) -> bool {
    matches!(status, 200 | 206)
}

/// Ok if the response can be written to disk; otherwise the retryable reason.
pub fn validate_payload(status: u32, body_len: u64, min_bytes: u64) -> Result<(), FragmentError> {
    if !is_accepted_status(status) {
        return Err(FragmentError::Status(status));
    }
    if body_len < min_bytes {
        return Err(FragmentError::Undersized {
            size: body_len,
            min: min_bytes,
        });
    }
    Ok(())
}
