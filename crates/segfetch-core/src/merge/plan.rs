//! Resolve what to concatenate, then stream it into the artifact.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::cleanup::delete_sources;
use super::digest::HashingWriter;
use super::{MergeOptions, MergeReport};
use crate::error::SegfetchError;
use crate::registry::DEFAULT_INIT_SUFFIX;
use crate::storage::{temp_path, AssetLayout};

const COPY_BUF: usize = 256 * 1024;

/// Files to concatenate, fixed at resolve time.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub init: Option<PathBuf>,
    /// Media fragments in ascending index order.
    pub fragments: Vec<(u32, PathBuf)>,
    pub output: PathBuf,
    pub delete_sources: bool,
}

impl MergePlan {
    /// Scans the asset folder and fixes the inputs and the output path.
    pub fn resolve(layout: &AssetLayout, options: &MergeOptions) -> Result<Self, SegfetchError> {
        tracing::info!(dir = %layout.dir().display(), "searching for fragments");
        let entries = match fs::read_dir(layout.dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SegfetchError::NoMediaFragments {
                    dir: layout.dir().to_path_buf(),
                    base: layout.base().to_string(),
                })
            }
            Err(source) => {
                return Err(SegfetchError::MergeIo {
                    path: layout.dir().to_path_buf(),
                    source,
                })
            }
        };

        let mut fragments = Vec::new();
        let mut init_candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SegfetchError::MergeIo {
                path: layout.dir().to_path_buf(),
                source,
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(index) = layout.parse_media_index(&name) {
                fragments.push((index, name));
            } else if layout.is_init_file(&name) {
                init_candidates.push(name);
            }
        }

        if fragments.is_empty() {
            return Err(SegfetchError::NoMediaFragments {
                dir: layout.dir().to_path_buf(),
                base: layout.base().to_string(),
            });
        }
        // Directory listing order is arbitrary; index order is the contract.
        fragments.sort();
        tracing::debug!(count = fragments.len(), "found and sorted fragment files");

        let init_name = match &options.init_suffix {
            Some(suffix) => {
                let path = layout.dir().join(layout.init_file_name(suffix));
                if !path.is_file() {
                    tracing::error!(path = %path.display(), "initialization fragment not found");
                    return Err(SegfetchError::InitializationMissing(path));
                }
                Some(layout.init_file_name(suffix))
            }
            None => {
                init_candidates.sort();
                init_candidates.into_iter().next()
            }
        };

        let output_suffix = options
            .output_suffix
            .clone()
            .or_else(|| {
                init_name
                    .as_deref()
                    .and_then(|n| n.strip_prefix(&format!("{}_init", layout.base())))
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_INIT_SUFFIX.to_string());

        Ok(MergePlan {
            init: init_name.map(|n| layout.dir().join(n)),
            fragments: fragments
                .into_iter()
                .map(|(i, n)| (i, layout.dir().join(n)))
                .collect(),
            output: layout.merged_path(&output_suffix),
            delete_sources: options.delete_sources,
        })
    }

    /// Writes the artifact. The bytes go to `<output>.part` and are renamed into
    /// place only after every input was copied; on failure the temp file is
    /// removed and the error surfaced. Fragments that vanished since `resolve`
    /// are skipped with a warning.
    pub fn execute(&self) -> Result<MergeReport, SegfetchError> {
        tracing::info!(output = %self.output.display(), "starting merge");
        let tmp = temp_path(&self.output);

        let copied = match self.write_to(&tmp) {
            Ok(copied) => copied,
            Err(e) => {
                discard_partial(&tmp);
                return Err(e);
            }
        };
        if let Err(source) = fs::rename(&tmp, &self.output) {
            discard_partial(&tmp);
            return Err(SegfetchError::MergeIo {
                path: self.output.clone(),
                source,
            });
        }
        tracing::info!(
            output = %self.output.display(),
            bytes = copied.bytes_written,
            skipped = copied.skipped.len(),
            "binary concatenation successful"
        );

        let cleanup = if self.delete_sources {
            tracing::info!("cleaning up source files");
            let appended: BTreeSet<u32> = copied.appended.iter().copied().collect();
            let appended_paths = self
                .fragments
                .iter()
                .filter(|(i, _)| appended.contains(i))
                .map(|(_, p)| p);
            Some(delete_sources(appended_paths.chain(self.init.iter())))
        } else {
            None
        };

        Ok(MergeReport {
            output: self.output.clone(),
            bytes_written: copied.bytes_written,
            sha256: copied.sha256,
            appended: copied.appended,
            skipped: copied.skipped,
            cleanup,
        })
    }

    fn write_to(&self, tmp: &Path) -> Result<Copied, SegfetchError> {
        let io_err = |source: io::Error| SegfetchError::MergeIo {
            path: self.output.clone(),
            source,
        };

        let file = File::create(tmp).map_err(io_err)?;
        let mut out = HashingWriter::new(BufWriter::with_capacity(COPY_BUF, file));

        if let Some(init) = &self.init {
            tracing::debug!(path = %init.display(), "appending init");
            match File::open(init) {
                Ok(mut f) => {
                    io::copy(&mut f, &mut out).map_err(io_err)?;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(SegfetchError::InitializationMissing(init.clone()));
                }
                Err(e) => return Err(io_err(e)),
            }
        }

        let total = self.fragments.len();
        let mut appended = Vec::with_capacity(total);
        let mut skipped = Vec::new();
        for (n, (index, path)) in self.fragments.iter().enumerate() {
            let n = n + 1;
            if n == 1 || n % 50 == 0 || n == total {
                tracing::info!("appending fragment {n}/{total}: {}", path.display());
            } else {
                tracing::debug!("appending fragment {n}/{total}: {}", path.display());
            }
            let mut f = match File::open(path) {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), "fragment file not found, skipping");
                    skipped.push(*index);
                    continue;
                }
                Err(e) => return Err(io_err(e)),
            };
            io::copy(&mut f, &mut out).map_err(io_err)?;
            appended.push(*index);
        }

        out.flush().map_err(io_err)?;
        let bytes_written = out.bytes_written();
        let (buffered, sha256) = out.finish();
        let file = buffered.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;

        Ok(Copied {
            bytes_written,
            sha256,
            appended,
            skipped,
        })
    }
}

struct Copied {
    bytes_written: u64,
    sha256: String,
    appended: Vec<u32>,
    skipped: Vec<u32>,
}

fn discard_partial(tmp: &Path) {
    match fs::remove_file(tmp) {
        Ok(()) => tracing::warn!(path = %tmp.display(), "deleted incomplete output file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!(path = %tmp.display(), error = %e, "could not delete incomplete output file")
        }
    }
}
