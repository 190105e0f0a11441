use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::transport::RequestHeaders;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per fragment (including the first).
    pub max_attempts: u32,
    /// Backoff unit in seconds; attempt `n` waits `n * backoff_base_secs`.
    pub backoff_base_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 1.0,
        }
    }
}

/// Request headers sent with every GET (optional section in config.toml).
///
/// Many CDNs reject requests without a browser-like `User-Agent` and a
/// matching `Referer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadersConfig {
    pub user_agent: String,
    pub referer: String,
    #[serde(default)]
    pub origin: Option<String>,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36"
                .to_string(),
            referer: "https://www.mgtv.com/".to_string(),
            origin: None,
        }
    }
}

/// Range the gap audit checks against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapRange {
    /// Interior of the observed min..max (leading/trailing holes go unreported).
    #[default]
    Observed,
    /// Every index the registry handed to the pool.
    Expected,
}

/// Global configuration loaded from `~/.config/segfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegfetchConfig {
    /// Maximum number of fragment fetches in flight at once.
    pub concurrency: usize,
    /// Payloads shorter than this are treated as error pages and retried.
    pub min_payload_bytes: u64,
    /// Per-request timeout for media fragments.
    pub fragment_timeout_secs: u64,
    /// Per-request timeout for the manifest and the init fragment.
    pub manifest_timeout_secs: u64,
    /// TCP/TLS connect timeout for every request.
    pub connect_timeout_secs: u64,
    /// Delete fragment files (and the init file) after a successful merge.
    pub delete_sources: bool,
    /// Run the gap audit between fetch and merge.
    pub check_gaps: bool,
    #[serde(default)]
    pub gap_range: GapRange,
    /// Re-check the size of already-present fragment files instead of trusting
    /// their existence. Off by default.
    #[serde(default)]
    pub revalidate_existing: bool,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional header overrides; if missing, built-in defaults are used.
    #[serde(default)]
    pub headers: Option<HeadersConfig>,
}

impl Default for SegfetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            min_payload_bytes: 300,
            fragment_timeout_secs: 15,
            manifest_timeout_secs: 60,
            connect_timeout_secs: 10,
            delete_sources: true,
            check_gaps: true,
            gap_range: GapRange::Observed,
            revalidate_existing: false,
            retry: None,
            headers: None,
        }
    }
}

impl SegfetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = self.retry.clone().unwrap_or_default();
        // Negative clamps to zero; NaN, infinity and overflow fall through to the default.
        let secs = if retry.backoff_base_secs < 0.0 {
            0.0
        } else {
            retry.backoff_base_secs
        };
        let backoff_base = match Duration::try_from_secs_f64(secs) {
            Ok(d) => d,
            Err(e) => {
                let fallback = RetryConfig::default().backoff_base_secs;
                tracing::warn!(
                    value = retry.backoff_base_secs,
                    error = %e,
                    "retry.backoff_base_secs out of range, using {fallback}s"
                );
                Duration::from_secs_f64(fallback)
            }
        };
        RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            backoff_base,
        }
    }

    pub fn request_headers(&self) -> RequestHeaders {
        let h = self.headers.clone().unwrap_or_default();
        RequestHeaders {
            user_agent: h.user_agent,
            referer: h.referer,
            origin: h.origin,
        }
    }

    pub fn fragment_timeout(&self) -> Duration {
        Duration::from_secs(self.fragment_timeout_secs)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("segfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SegfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SegfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SegfetchConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
