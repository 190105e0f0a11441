//! One asset end to end: manifest → registry → fetch pool → gap audit → merge.
//!
//! Blocking; async callers wrap [`Pipeline::run_job`] in `spawn_blocking`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{GapRange, SegfetchConfig};
use crate::error::SegfetchError;
use crate::fetcher::{FetchProgress, FetchReport, FetchSettings, FragmentFetcher};
use crate::gaps;
use crate::merge::{merge_fragments, MergeOptions, MergeReport};
use crate::naming::guess_base_name;
use crate::playlist;
use crate::registry::FragmentRegistry;
use crate::retry::Sleeper;
use crate::storage::AssetLayout;
use crate::transport::Transport;

/// What to fetch and where to put it.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub manifest_url: String,
    /// Guessed from the manifest URL when `None`.
    pub base_name: Option<String>,
    pub output_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub base_name: String,
    pub asset_dir: PathBuf,
    pub fetch: FetchReport,
    /// `None` when the audit was disabled.
    pub gaps: Option<Vec<u32>>,
    pub merge: MergeReport,
    pub elapsed: Duration,
}

pub struct Pipeline {
    transport: Arc<dyn Transport>,
    sleeper: Option<Arc<dyn Sleeper>>,
    config: SegfetchConfig,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>, config: SegfetchConfig) -> Self {
        Self {
            transport,
            sleeper: None,
            config,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn config(&self) -> &SegfetchConfig {
        &self.config
    }

    /// Downloads the manifest, keeps a copy, then runs [`Pipeline::run_registry`].
    pub fn run_job(
        &self,
        job: &JobSpec,
        progress_tx: Option<&tokio::sync::mpsc::Sender<FetchProgress>>,
    ) -> Result<RunReport, SegfetchError> {
        let started = Instant::now();
        let base = match &job.base_name {
            Some(b) => b.clone(),
            None => guess_base_name(&job.manifest_url),
        };
        tracing::info!(url = %job.manifest_url, base = %base, "job started");

        let text = playlist::fetch_manifest(
            self.transport.as_ref(),
            &job.manifest_url,
            &self.config.request_headers(),
            self.config.manifest_timeout(),
        )?;
        let copy = playlist::manifest_copy_path(&job.output_root, &base);
        if let Err(e) = playlist::save_manifest(&copy, &text) {
            tracing::warn!(path = %copy.display(), error = %e, "could not save manifest copy");
        }

        let registry = playlist::parse_playlist(&job.manifest_url, &text).to_registry();
        let layout = AssetLayout::new(job.output_root.join(&base), base);
        let mut report = self.run_registry(&registry, &layout, progress_tx)?;
        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Fetch, audit and merge for an already-built registry.
    pub fn run_registry(
        &self,
        registry: &FragmentRegistry,
        layout: &AssetLayout,
        progress_tx: Option<&tokio::sync::mpsc::Sender<FetchProgress>>,
    ) -> Result<RunReport, SegfetchError> {
        let started = Instant::now();
        registry.ensure_fetchable()?;
        tracing::info!(
            dir = %layout.dir().display(),
            init = registry.init().is_some(),
            media = registry.media_count(),
            "registry ready"
        );

        let mut fetcher =
            FragmentFetcher::new(Arc::clone(&self.transport), FetchSettings::from_config(&self.config));
        if let Some(s) = &self.sleeper {
            fetcher = fetcher.with_sleeper(Arc::clone(s));
        }
        let descriptors: Vec<_> = registry.descriptors().cloned().collect();
        let fetch = fetcher.fetch_all(&descriptors, layout, progress_tx);
        summarize_failures(&fetch, registry.media_count());

        let gaps = self.config.check_gaps.then(|| audit_gaps(&self.config, layout, registry));

        let options = MergeOptions {
            init_suffix: registry.init().map(|d| d.suffix.clone()),
            output_suffix: Some(registry.artifact_suffix().to_string()),
            delete_sources: self.config.delete_sources,
        };
        let merge = merge_fragments(layout, &options)?;
        let elapsed = started.elapsed();
        tracing::info!(
            output = %merge.output.display(),
            sha256 = %merge.sha256,
            elapsed_secs = elapsed.as_secs_f64(),
            "job finished"
        );

        Ok(RunReport {
            base_name: layout.base().to_string(),
            asset_dir: layout.dir().to_path_buf(),
            fetch,
            gaps,
            merge,
            elapsed,
        })
    }
}

fn summarize_failures(fetch: &FetchReport, media_count: usize) {
    let failed = fetch.failed();
    if failed.is_empty() {
        tracing::info!(
            succeeded = fetch.succeeded(),
            resumed = fetch.resumed.len(),
            bytes = fetch.bytes_written(),
            "all fragments fetched"
        );
        return;
    }
    let list = failed.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    if failed.len() * 2 > media_count {
        tracing::error!(
            failed = failed.len(),
            expected = media_count,
            "more than half of the fragments failed: {list}"
        );
    } else {
        tracing::warn!(failed = failed.len(), expected = media_count, "fragments failed: {list}");
    }
}

fn audit_gaps(config: &SegfetchConfig, layout: &AssetLayout, registry: &FragmentRegistry) -> Vec<u32> {
    let missing = match config.gap_range {
        GapRange::Observed => gaps::find_missing_segments(layout),
        GapRange::Expected => gaps::find_missing_expected(layout, &registry.media_indices()),
    };
    if missing.is_empty() {
        tracing::info!("gap check passed, no missing fragments");
    } else {
        tracing::warn!(
            count = missing.len(),
            "missing fragments: {}",
            gaps::format_indices(&missing)
        );
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FragmentDescriptor;
    use crate::transport::{Request, Response, TransportError};
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;

    /// Serves a fixed route table; unknown URLs get 404.
    struct Routes {
        routes: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl Routes {
        fn new(routes: &[(&str, Vec<u8>)]) -> Self {
            Self {
                routes: routes.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Routes {
        fn get(&self, req: &Request<'_>) -> Result<Response, TransportError> {
            self.calls.lock().unwrap().push(req.url.to_string());
            Ok(match self.routes.get(req.url) {
                Some(body) => Response {
                    status: 200,
                    body: body.clone(),
                },
                None => Response {
                    status: 404,
                    body: b"not found".to_vec(),
                },
            })
        }
    }

    struct NoSleep;
    impl Sleeper for NoSleep {
        fn sleep(&self, _d: Duration) {}
    }

    fn config() -> SegfetchConfig {
        SegfetchConfig {
            concurrency: 2,
            min_payload_bytes: 1,
            delete_sources: false,
            ..SegfetchConfig::default()
        }
    }

    const MANIFEST: &str = "#EXTM3U\n#EXT-X-MAP:URI=\"init.mp4\"\n#EXTINF:4,\na.m4s\n#EXTINF:4,\nb.m4s\n#EXTINF:4,\nc.m4s\n";

    #[test]
    fn run_job_fetches_and_merges_in_order() {
        let root = tempfile::tempdir().unwrap();
        let t = Arc::new(Routes::new(&[
            ("https://h/show/ep1/index.m3u8", MANIFEST.as_bytes().to_vec()),
            ("https://h/show/ep1/init.mp4", b"I".to_vec()),
            ("https://h/show/ep1/a.m4s", b"A".to_vec()),
            ("https://h/show/ep1/b.m4s", b"B".to_vec()),
            ("https://h/show/ep1/c.m4s", b"C".to_vec()),
        ]));
        let pipeline = Pipeline::new(t, config()).with_sleeper(Arc::new(NoSleep));
        let job = JobSpec {
            manifest_url: "https://h/show/ep1/index.m3u8".into(),
            base_name: None,
            output_root: root.path().to_path_buf(),
        };
        let report = pipeline.run_job(&job, None).unwrap();
        assert_eq!(report.base_name, "ep1");
        assert_eq!(report.fetch.succeeded(), 4);
        assert_eq!(report.gaps, Some(vec![]));
        assert_eq!(fs::read(&report.merge.output).unwrap(), b"IABC");
        assert_eq!(report.merge.output, root.path().join("ep1").join("ep1_merged.mp4"));
        assert!(root.path().join("ep1_master.m3u8.txt").is_file());
    }

    #[test]
    fn permanent_failure_still_merges_the_rest() {
        let root = tempfile::tempdir().unwrap();
        let t = Arc::new(Routes::new(&[
            ("https://h/init.mp4", b"I".to_vec()),
            ("https://h/a.m4s", b"A".to_vec()),
            ("https://h/c.m4s", b"C".to_vec()),
        ]));
        let registry = FragmentRegistry::new(
            Some(FragmentDescriptor::init("https://h/init.mp4", ".mp4")),
            vec![
                FragmentDescriptor::media(1, "https://h/a.m4s", ".m4s"),
                FragmentDescriptor::media(2, "https://h/b.m4s", ".m4s"),
                FragmentDescriptor::media(3, "https://h/c.m4s", ".m4s"),
            ],
        );
        let layout = AssetLayout::new(root.path().join("x"), "x");
        let pipeline = Pipeline::new(t.clone(), config()).with_sleeper(Arc::new(NoSleep));
        let report = pipeline.run_registry(&registry, &layout, None).unwrap();

        assert_eq!(report.fetch.failure_count(), 1);
        assert_eq!(report.gaps, Some(vec![2]));
        assert_eq!(fs::read(&report.merge.output).unwrap(), b"IAC");
        let b_calls = t
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == "https://h/b.m4s")
            .count();
        assert_eq!(b_calls, 3);
    }

    #[test]
    fn expected_gap_range_sees_trailing_hole() {
        let root = tempfile::tempdir().unwrap();
        let t = Arc::new(Routes::new(&[
            ("https://h/a.m4s", b"A".to_vec()),
            ("https://h/b.m4s", b"B".to_vec()),
        ]));
        let registry = FragmentRegistry::from_urls(
            None,
            &[
                "https://h/a.m4s".to_string(),
                "https://h/b.m4s".to_string(),
                "https://h/c.m4s".to_string(),
            ],
        );
        let layout = AssetLayout::new(root.path().join("y"), "y");
        let cfg = SegfetchConfig {
            gap_range: GapRange::Expected,
            ..config()
        };
        let report = Pipeline::new(t, cfg)
            .with_sleeper(Arc::new(NoSleep))
            .run_registry(&registry, &layout, None)
            .unwrap();
        assert_eq!(report.gaps, Some(vec![3]));
        assert_eq!(fs::read(&report.merge.output).unwrap(), b"AB");
        assert_eq!(report.merge.output.file_name().unwrap(), "y_merged.m4s");
    }

    #[test]
    fn manifest_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(Arc::new(Routes::new(&[])), config());
        let job = JobSpec {
            manifest_url: "https://h/a/index.m3u8".into(),
            base_name: Some("a".into()),
            output_root: root.path().to_path_buf(),
        };
        let err = pipeline.run_job(&job, None).unwrap_err();
        assert!(matches!(err, SegfetchError::ManifestUnavailable { .. }));
    }

    #[test]
    fn empty_registry_is_rejected_before_any_request() {
        let root = tempfile::tempdir().unwrap();
        let t = Arc::new(Routes::new(&[]));
        let layout = AssetLayout::new(root.path().join("z"), "z");
        let err = Pipeline::new(t.clone(), config())
            .run_registry(&FragmentRegistry::default(), &layout, None)
            .unwrap_err();
        assert!(matches!(err, SegfetchError::NoFetchableDescriptors));
        assert!(t.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn init_failure_makes_merge_fail() {
        let root = tempfile::tempdir().unwrap();
        let t = Arc::new(Routes::new(&[("https://h/a.m4s", b"A".to_vec())]));
        let registry = FragmentRegistry::new(
            Some(FragmentDescriptor::init("https://h/init.mp4", ".mp4")),
            vec![FragmentDescriptor::media(1, "https://h/a.m4s", ".m4s")],
        );
        let layout = AssetLayout::new(root.path().join("w"), "w");
        let err = Pipeline::new(t, config())
            .with_sleeper(Arc::new(NoSleep))
            .run_registry(&registry, &layout, None)
            .unwrap_err();
        assert!(matches!(err, SegfetchError::InitializationMissing(_)));
    }
}
