//! Removal of source fragments after a successful merge.

use std::fs;
use std::path::PathBuf;

/// Counts from the cleanup step. Failures are logged, never fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: Vec<PathBuf>,
}

pub(super) fn delete_sources<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> CleanupReport {
    let mut report = CleanupReport::default();
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not delete source file");
                report.failed.push(path.clone());
            }
        }
    }
    tracing::debug!(deleted = report.deleted, failed = report.failed.len(), "cleanup complete");
    report
}
