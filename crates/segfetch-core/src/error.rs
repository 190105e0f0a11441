//! Run-level error taxonomy.
//!
//! Per-fragment failures never show up here: they are absorbed by the retry
//! loop and recorded in the fetch report. These variants are the conditions
//! that make the output meaningless and stop the run (or the merge stage).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegfetchError {
    /// Manifest GET failed or returned a non-2xx status.
    #[error("manifest unavailable: {url}: {reason}")]
    ManifestUnavailable { url: String, reason: String },

    /// The registry holds neither an init fragment nor any media fragment.
    #[error("no fetchable content: manifest lists no init or media fragments")]
    NoFetchableDescriptors,

    /// The init fragment was expected but is not on disk when merging.
    #[error("initialization fragment not found: {}", .0.display())]
    InitializationMissing(PathBuf),

    /// No media fragment files matched the naming convention.
    #[error("no media fragments for '{base}' in {}", .dir.display())]
    NoMediaFragments { dir: PathBuf, base: String },

    /// Read/write failure while producing the merged artifact.
    #[error("merge failed writing {}: {source}", .path.display())]
    MergeIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
