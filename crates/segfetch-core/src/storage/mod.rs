//! Fragment files on disk: deterministic naming and atomic placement.
//!
//! Every file is written to `<name>.part` first and renamed into place only
//! once fully written and synced, so a name under the asset folder is either
//! complete or absent.

mod layout;
mod writer;

pub use layout::AssetLayout;
pub use writer::write_atomic;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `a_seg_0001.m4s` → `a_seg_0001.m4s.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}
