//! Line scan of a media playlist.
//!
//! Recognizes exactly two things: the `#EXT-X-MAP:URI="..."` init reference
//! and non-comment lines, which are media URIs in manifest order. Every other
//! tag is ignored.

use url::Url;

use crate::registry::FragmentRegistry;

const MAP_TAG: &str = "#EXT-X-MAP:";

/// URIs found in a playlist, already resolved to absolute URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlaylist {
    pub init_url: Option<String>,
    pub media_urls: Vec<String>,
}

impl ParsedPlaylist {
    /// Registry with media indices assigned from 1 in manifest order.
    pub fn to_registry(&self) -> FragmentRegistry {
        FragmentRegistry::from_urls(self.init_url.as_deref(), &self.media_urls)
    }
}

/// Parses `text`, resolving relative URIs against the directory of
/// `manifest_url`. If several map tags are present the last one wins.
pub fn parse_playlist(manifest_url: &str, text: &str) -> ParsedPlaylist {
    let base = match Url::parse(manifest_url) {
        Ok(u) => Some(u),
        Err(e) => {
            tracing::warn!(url = %manifest_url, error = %e, "manifest URL is not absolute; URIs kept as written");
            None
        }
    };
    let resolve = |uri: &str| -> String {
        match &base {
            Some(b) => match b.join(uri) {
                Ok(u) => u.to_string(),
                Err(e) => {
                    tracing::warn!(uri, error = %e, "could not resolve URI; kept as written");
                    uri.to_string()
                }
            },
            None => uri.to_string(),
        }
    };

    let mut out = ParsedPlaylist::default();
    for line in text.lines() {
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }
        if let Some(attrs) = line.strip_prefix(MAP_TAG) {
            match map_uri(attrs) {
                Some(uri) => {
                    let full = resolve(uri);
                    tracing::debug!(uri, full = %full, "found EXT-X-MAP");
                    out.init_url = Some(full);
                }
                None => tracing::warn!(line, "could not parse EXT-X-MAP line"),
            }
        } else if !line.starts_with('#') {
            out.media_urls.push(resolve(line));
        }
    }
    tracing::info!(
        init = out.init_url.is_some(),
        media = out.media_urls.len(),
        "parsed playlist"
    );
    out
}

/// Value of the quoted `URI` attribute.
fn map_uri(attrs: &str) -> Option<&str> {
    let start = attrs.find("URI=\"")? + "URI=\"".len();
    let rest = &attrs[start..];
    let end = rest.find('"')?;
    let uri = rest[..end].trim();
    (!uri.is_empty()).then_some(uri)
}
