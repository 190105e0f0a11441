//! Output base name when the operator did not supply one.

mod sanitize;

pub use sanitize::sanitize_base_name;

/// Used when nothing usable can be derived from the URL.
pub const FALLBACK_BASE_NAME: &str = "downloaded_video";

/// Guesses a base name from the manifest URL: the path segment that holds the
/// manifest (second-to-last), sanitized. `https://cdn/x/Ep01/index.m3u8`
/// yields `Ep01`.
pub fn guess_base_name(manifest_url: &str) -> String {
    let guessed = url::Url::parse(manifest_url).ok().and_then(|u| {
        let segments: Vec<String> = u.path_segments()?.map(str::to_string).collect();
        if segments.len() < 2 {
            return None;
        }
        // Raw segment: percent escapes are sanitized like any other character.
        let name = sanitize_base_name(&segments[segments.len() - 2]);
        if name.is_empty() || name.chars().all(|c| c == '_') {
            None
        } else {
            Some(name)
        }
    });
    match guessed {
        Some(name) => {
            tracing::info!(name = %name, "output name not provided, guessed from URL");
            name
        }
        None => {
            tracing::warn!(url = %manifest_url, "could not guess output name from URL, using '{FALLBACK_BASE_NAME}'");
            FALLBACK_BASE_NAME.to_string()
        }
    }
}
