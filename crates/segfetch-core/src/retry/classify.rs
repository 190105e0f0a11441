//! Map fragment errors onto retry policy error kinds.

use super::error::FragmentError;
use super::policy::ErrorKind;

/// Classify a fragment error into an ErrorKind.
pub fn classify(e: &FragmentError) -> ErrorKind {
    match e {
        FragmentError::Transport(_) | FragmentError::Status(_) => ErrorKind::TransportFailure,
        FragmentError::Undersized { .. } => ErrorKind::RejectedPayload,
        FragmentError::Storage(_) => ErrorKind::Storage,
    }
}
