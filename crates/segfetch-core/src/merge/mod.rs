//! Ordered concatenation of persisted fragments into one artifact.
//!
//! Two phases: [`MergePlan::resolve`] scans the asset folder and fixes the
//! inputs, [`MergePlan::execute`] streams them in order. A fragment that
//! disappears between the two is skipped with a warning. The merge never
//! consults the fetch report; what is on disk is what gets merged.

mod cleanup;
mod digest;
mod plan;

use std::path::PathBuf;

pub use cleanup::CleanupReport;
pub use plan::MergePlan;

use crate::error::SegfetchError;
use crate::storage::AssetLayout;

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// When set, `{base}_init{suffix}` must exist or the merge aborts.
    /// When unset, an init file is used if one is found.
    pub init_suffix: Option<String>,
    /// Suffix of the merged artifact; derived from the init file otherwise.
    pub output_suffix: Option<String>,
    /// Delete appended fragments and the init after a successful merge.
    pub delete_sources: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            init_suffix: None,
            output_suffix: None,
            delete_sources: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub output: PathBuf,
    pub bytes_written: u64,
    /// Lowercase hex SHA-256 of the artifact.
    pub sha256: String,
    /// Media indices copied, in output order.
    pub appended: Vec<u32>,
    /// Media indices that vanished after resolve.
    pub skipped: Vec<u32>,
    /// `None` when cleanup was disabled.
    pub cleanup: Option<CleanupReport>,
}

/// Resolve then execute.
pub fn merge_fragments(
    layout: &AssetLayout,
    options: &MergeOptions,
) -> Result<MergeReport, SegfetchError> {
    MergePlan::resolve(layout, options)?.execute()
}
