//! One descriptor: resume short-circuit, then attempts under the retry policy.

use std::fs;
use std::path::Path;

use crate::registry::FragmentDescriptor;
use crate::retry::{run_with_retry, FragmentError};
use crate::storage::write_atomic;
use crate::transport::Request;
use crate::validate::validate_payload;

use super::{FetchOutcome, Shared};

/// Final state of one descriptor as seen by the collector.
pub(super) struct FragmentResult {
    pub outcome: FetchOutcome,
    /// The file was already present and no request was made.
    pub resumed: bool,
}

pub(super) fn fetch_fragment(shared: &Shared, descriptor: &FragmentDescriptor) -> FragmentResult {
    let path = shared.layout.fragment_path(descriptor);

    if already_fetched(shared, &path) {
        tracing::debug!(path = %path.display(), "already on disk, skipping");
        return FragmentResult {
            outcome: FetchOutcome::Success { bytes_written: 0 },
            resumed: true,
        };
    }

    let outcome = match run_with_retry(&shared.settings.policy, shared.sleeper.as_ref(), |attempt| {
        tracing::debug!(attempt, url = %descriptor.url, "GET");
        attempt_once(shared, descriptor, &path)
    }) {
        Ok(bytes_written) => {
            tracing::debug!(path = %path.display(), bytes_written, "fragment saved");
            FetchOutcome::Success { bytes_written }
        }
        Err(exhausted) => {
            tracing::error!(
                url = %descriptor.url,
                attempts = exhausted.attempts,
                error = %exhausted.last,
                "fragment failed permanently"
            );
            FetchOutcome::PermanentFailure {
                attempts: exhausted.attempts,
                last_error: exhausted.last.to_string(),
            }
        }
    };
    FragmentResult {
        outcome,
        resumed: false,
    }
}

/// A present file counts as fetched. With `revalidate_existing`, an undersized
/// one is removed and fetched again instead.
fn already_fetched(shared: &Shared, path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !shared.settings.revalidate_existing || meta.len() >= shared.settings.min_payload_bytes {
        return true;
    }
    tracing::warn!(
        path = %path.display(),
        size = meta.len(),
        "existing fragment below minimum size, fetching again"
    );
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "could not remove undersized fragment");
    }
    false
}

/// One GET, validation, and atomic write. Returns bytes written.
pub(super) fn attempt_once(
    shared: &Shared,
    descriptor: &FragmentDescriptor,
    path: &Path,
) -> Result<u64, FragmentError> {
    let timeout = if descriptor.is_init() {
        shared.settings.init_timeout
    } else {
        shared.settings.fragment_timeout
    };
    let response = shared.transport.get(&Request {
        url: &descriptor.url,
        headers: &shared.settings.headers,
        timeout,
    })?;
    validate_payload(
        response.status,
        response.body.len() as u64,
        shared.settings.min_payload_bytes,
    )?;
    write_atomic(path, &response.body).map_err(FragmentError::Storage)
}
