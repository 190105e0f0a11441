//! Manifest acquisition and parsing.

mod parse;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use parse::{parse_playlist, ParsedPlaylist};

use crate::error::SegfetchError;
use crate::transport::{Request, RequestHeaders, Transport};

/// Where the manifest copy lives: `<output_root>/{base}_master.m3u8.txt`.
pub fn manifest_copy_path(output_root: &Path, base: &str) -> PathBuf {
    output_root.join(format!("{base}_master.m3u8.txt"))
}

/// One GET of the manifest. Transport failure or a non-2xx status is fatal.
pub fn fetch_manifest(
    transport: &dyn Transport,
    url: &str,
    headers: &RequestHeaders,
    timeout: Duration,
) -> Result<String, SegfetchError> {
    tracing::info!(url, "downloading manifest");
    let resp = transport
        .get(&Request {
            url,
            headers,
            timeout,
        })
        .map_err(|e| SegfetchError::ManifestUnavailable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    if !(200..300).contains(&resp.status) {
        return Err(SegfetchError::ManifestUnavailable {
            url: url.to_string(),
            reason: format!("HTTP {}", resp.status),
        });
    }
    tracing::debug!(bytes = resp.body.len(), "manifest downloaded");
    Ok(String::from_utf8_lossy(&resp.body).into_owned())
}

/// Keeps a copy of the manifest text next to the asset folder.
pub fn save_manifest(path: &Path, text: &str) -> std::io::Result<()> {
    crate::storage::write_atomic(path, text.as_bytes())?;
    tracing::info!(path = %path.display(), "manifest saved");
    Ok(())
}
