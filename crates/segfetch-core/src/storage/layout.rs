//! File naming inside one asset folder.
//!
//! `{base}_seg_{index:04}{suffix}` for media, `{base}_init{suffix}` for the
//! init fragment, `{base}_merged{suffix}` for the artifact. The index is
//! zero-padded to four digits so name order equals index order up to 9999.

use std::path::{Path, PathBuf};

use super::TEMP_SUFFIX;
use crate::registry::{FragmentDescriptor, FragmentKey};

#[derive(Debug, Clone)]
pub struct AssetLayout {
    dir: PathBuf,
    base: String,
}

impl AssetLayout {
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn media_file_name(&self, index: u32, suffix: &str) -> String {
        format!("{}_seg_{:04}{}", self.base, index, suffix)
    }

    pub fn init_file_name(&self, suffix: &str) -> String {
        format!("{}_init{}", self.base, suffix)
    }

    pub fn merged_file_name(&self, suffix: &str) -> String {
        format!("{}_merged{}", self.base, suffix)
    }

    /// Destination of a fetched fragment.
    pub fn fragment_path(&self, descriptor: &FragmentDescriptor) -> PathBuf {
        let name = match descriptor.key {
            FragmentKey::Init => self.init_file_name(&descriptor.suffix),
            FragmentKey::Media(i) => self.media_file_name(i, &descriptor.suffix),
        };
        self.dir.join(name)
    }

    pub fn merged_path(&self, suffix: &str) -> PathBuf {
        self.dir.join(self.merged_file_name(suffix))
    }

    fn media_prefix(&self) -> String {
        format!("{}_seg_", self.base)
    }

    /// Index of a media fragment file name, or `None` for anything else
    /// (init, merged artifact, temp files, other assets).
    ///
    /// Accepts four or more digits followed by a `.ext` suffix or nothing.
    pub fn parse_media_index(&self, file_name: &str) -> Option<u32> {
        if file_name.ends_with(TEMP_SUFFIX) {
            return None;
        }
        let rest = file_name.strip_prefix(&self.media_prefix())?;
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end < 4 {
            return None;
        }
        let tail = &rest[digits_end..];
        if !(tail.is_empty() || tail.starts_with('.')) {
            return None;
        }
        rest[..digits_end].parse().ok()
    }

    /// Whether `file_name` is this asset's init fragment (any suffix).
    pub fn is_init_file(&self, file_name: &str) -> bool {
        if file_name.ends_with(TEMP_SUFFIX) {
            return false;
        }
        match file_name.strip_prefix(&format!("{}_init", self.base)) {
            Some(tail) => tail.is_empty() || tail.starts_with('.'),
            None => false,
        }
    }
}
