//! Post-fetch audit of the persisted media fragments.
//!
//! Advisory only: a reported gap is logged, never re-fetched. The default
//! audit only sees holes strictly inside the observed min..max; missing
//! fragments before the first or after the last file on disk go unreported.
//! [`missing_against_expected`] closes that hole when the expected index set
//! is known.

use std::collections::BTreeSet;
use std::fs;
use std::io;

use crate::storage::AssetLayout;

/// Indices of media fragment files present in the asset folder, ascending.
pub fn persisted_media_indices(layout: &AssetLayout) -> io::Result<BTreeSet<u32>> {
    let mut found = BTreeSet::new();
    for entry in fs::read_dir(layout.dir())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(index) = entry.file_name().to_str().and_then(|n| layout.parse_media_index(n)) {
            found.insert(index);
        }
    }
    Ok(found)
}

/// `{min..=max} − observed`, ascending. Empty or single-element input has no interior.
pub fn missing_in_observed_range(observed: &BTreeSet<u32>) -> Vec<u32> {
    let (Some(&min), Some(&max)) = (observed.first(), observed.last()) else {
        return Vec::new();
    };
    (min..=max).filter(|i| !observed.contains(i)).collect()
}

/// `expected − observed`, ascending.
pub fn missing_against_expected(observed: &BTreeSet<u32>, expected: &[u32]) -> Vec<u32> {
    let expected: BTreeSet<u32> = expected.iter().copied().collect();
    expected.difference(observed).copied().collect()
}

/// Scans the asset folder and returns the interior gaps of the observed range.
///
/// A missing or unreadable folder is logged and reported as no gaps.
pub fn find_missing_segments(layout: &AssetLayout) -> Vec<u32> {
    match persisted_media_indices(layout) {
        Ok(observed) => {
            if observed.is_empty() {
                tracing::warn!(
                    dir = %layout.dir().display(),
                    "no files matching '{}_seg_NNNN' found",
                    layout.base()
                );
            }
            missing_in_observed_range(&observed)
        }
        Err(e) => {
            tracing::error!(dir = %layout.dir().display(), error = %e, "cannot scan for gaps");
            Vec::new()
        }
    }
}

/// Scans the asset folder and returns every `expected` index that has no file.
pub fn find_missing_expected(layout: &AssetLayout, expected: &[u32]) -> Vec<u32> {
    match persisted_media_indices(layout) {
        Ok(observed) => missing_against_expected(&observed, expected),
        Err(e) => {
            tracing::error!(dir = %layout.dir().display(), error = %e, "cannot scan for gaps");
            expected.to_vec()
        }
    }
}

/// `0003, 0004` style list for log lines.
pub fn format_indices(indices: &[u32]) -> String {
    indices
        .iter()
        .map(|i| format!("{i:04}"))
        .collect::<Vec<_>>()
        .join(", ")
}
