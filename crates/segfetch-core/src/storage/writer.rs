//! Write-to-temp-then-rename placement of a fetched payload.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use super::temp_path;

/// Writes `data` to `final_path` atomically: the bytes go to `<final>.part`,
/// are synced, then renamed over the final name. On any error the temp file
/// is removed and the final name is left untouched. Returns bytes written.
pub fn write_atomic(final_path: &Path, data: &[u8]) -> io::Result<u64> {
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(final_path);
    let result = write_and_sync(&tmp, data).and_then(|()| fs::rename(&tmp, final_path));
    if let Err(e) = result {
        if tmp.exists() {
            if let Err(rm) = fs::remove_file(&tmp) {
                tracing::warn!(path = %tmp.display(), error = %rm, "could not remove temp file");
            }
        }
        return Err(e);
    }
    Ok(data.len() as u64)
}

fn write_and_sync(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}
