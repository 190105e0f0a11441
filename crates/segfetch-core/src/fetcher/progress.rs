//! Progress reporting for the fetch phase.
//!
//! The pool's collector loop is the only writer; snapshots are pushed to an
//! optional channel so an async consumer (the CLI) can render them.

/// Snapshot of fetch progress for one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchProgress {
    /// Descriptors resolved so far (success or permanent failure).
    pub done: usize,
    /// Of `done`, how many failed permanently.
    pub failed: usize,
    /// Of `done`, how many were already on disk.
    pub resumed: usize,
    /// Total descriptors in this run.
    pub total: usize,
    /// New bytes written this run.
    pub bytes_written: u64,
}

impl FetchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.done as f64 / self.total as f64).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }

    /// Log the first, every 50th and the last completion at info, the rest at debug.
    pub(crate) fn should_log_at_info(&self) -> bool {
        self.done == 1 || self.done % 50 == 0 || self.is_complete()
    }
}
