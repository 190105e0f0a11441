//! Fragment registry: the ordered list of things to fetch for one asset.
//!
//! Built from the manifest parser's output; performs no I/O.

use std::fmt;

use crate::error::SegfetchError;

/// Suffix used for the init fragment when its URL carries no extension.
pub const DEFAULT_INIT_SUFFIX: &str = ".mp4";
/// Suffix used for media fragments when their URL carries no extension.
pub const DEFAULT_MEDIA_SUFFIX: &str = ".m4s";

/// Identity of a fragment within an asset. `Init` orders before every media index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FragmentKey {
    Init,
    Media(u32),
}

impl FragmentKey {
    pub fn index(&self) -> Option<u32> {
        match self {
            FragmentKey::Init => None,
            FragmentKey::Media(i) => Some(*i),
        }
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentKey::Init => write!(f, "init"),
            FragmentKey::Media(i) => write!(f, "{i:04}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDescriptor {
    pub key: FragmentKey,
    pub url: String,
    /// File suffix including the leading dot, e.g. `.m4s`.
    pub suffix: String,
}

impl FragmentDescriptor {
    pub fn init(url: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            key: FragmentKey::Init,
            url: url.into(),
            suffix: suffix.into(),
        }
    }

    pub fn media(index: u32, url: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            key: FragmentKey::Media(index),
            url: url.into(),
            suffix: suffix.into(),
        }
    }

    pub fn is_init(&self) -> bool {
        self.key == FragmentKey::Init
    }
}

/// Ordered descriptors for one asset: optional init, then media by index.
#[derive(Debug, Clone, Default)]
pub struct FragmentRegistry {
    init: Option<FragmentDescriptor>,
    media: Vec<FragmentDescriptor>,
}

impl FragmentRegistry {
    /// Build from caller-indexed descriptors. Media are sorted by index; a
    /// duplicate index keeps the first descriptor seen.
    pub fn new(init: Option<FragmentDescriptor>, media: Vec<FragmentDescriptor>) -> Self {
        let mut media: Vec<_> = media.into_iter().filter(|d| !d.is_init()).collect();
        // Stable sort keeps encounter order among duplicates.
        media.sort_by_key(|d| d.key);
        media.dedup_by_key(|d| d.key);
        Self { init, media }
    }

    /// Build from resolved URLs in manifest order. Media indices start at 1.
    pub fn from_urls(init_url: Option<&str>, media_urls: &[String]) -> Self {
        let init = init_url.map(|u| FragmentDescriptor::init(u, suffix_from_url(u, DEFAULT_INIT_SUFFIX)));
        let media = media_urls
            .iter()
            .enumerate()
            .map(|(i, u)| {
                FragmentDescriptor::media(i as u32 + 1, u.as_str(), suffix_from_url(u, DEFAULT_MEDIA_SUFFIX))
            })
            .collect();
        Self { init, media }
    }

    pub fn init(&self) -> Option<&FragmentDescriptor> {
        self.init.as_ref()
    }

    pub fn media(&self) -> &[FragmentDescriptor] {
        &self.media
    }

    pub fn media_count(&self) -> usize {
        self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.init.is_none() && self.media.is_empty()
    }

    /// All descriptors, init first.
    pub fn descriptors(&self) -> impl Iterator<Item = &FragmentDescriptor> {
        self.init.iter().chain(self.media.iter())
    }

    /// Media indices handed out by this registry, ascending.
    pub fn media_indices(&self) -> Vec<u32> {
        self.media.iter().filter_map(|d| d.key.index()).collect()
    }

    /// Suffix the merged artifact should carry: the init's, else the first media's.
    pub fn artifact_suffix(&self) -> &str {
        self.init
            .as_ref()
            .or_else(|| self.media.first())
            .map(|d| d.suffix.as_str())
            .unwrap_or(DEFAULT_INIT_SUFFIX)
    }

    pub fn ensure_fetchable(&self) -> Result<(), SegfetchError> {
        if self.is_empty() {
            return Err(SegfetchError::NoFetchableDescriptors);
        }
        Ok(())
    }
}

/// Extension of the last URL path segment (with leading dot), or `default`.
pub fn suffix_from_url(url: &str, default: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let last = path.rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{ext}")
        }
        _ => default.to_string(),
    }
}
