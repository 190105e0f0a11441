//! Fetch worker pool.
//!
//! Runs one task per fragment descriptor on a fixed pool of `concurrency`
//! threads draining a shared queue. Every descriptor is resolved (success or
//! permanent failure) before [`FragmentFetcher::fetch_all`] returns; one bad
//! fragment never stops the others.

mod fragment;
mod progress;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SegfetchConfig;
use crate::registry::{FragmentDescriptor, FragmentKey};
use crate::retry::{FragmentError, RetryPolicy, Sleeper, ThreadSleeper};
use crate::storage::AssetLayout;
use crate::transport::{RequestHeaders, Transport};

pub use progress::FetchProgress;

/// Result for one descriptor.
///
/// A single attempt yields `Success`, `RejectedPayload` or `TransportFailure`;
/// after the retry loop the pool only reports `Success` or `PermanentFailure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { bytes_written: u64 },
    RejectedPayload(String),
    TransportFailure(String),
    PermanentFailure { attempts: u32, last_error: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

impl From<FragmentError> for FetchOutcome {
    fn from(e: FragmentError) -> Self {
        match e {
            FragmentError::Undersized { .. } => FetchOutcome::RejectedPayload(e.to_string()),
            FragmentError::Transport(_) | FragmentError::Status(_) => {
                FetchOutcome::TransportFailure(e.to_string())
            }
            FragmentError::Storage(_) => FetchOutcome::PermanentFailure {
                attempts: 1,
                last_error: e.to_string(),
            },
        }
    }
}

/// Knobs for the pool, usually derived from [`SegfetchConfig`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub concurrency: usize,
    pub policy: RetryPolicy,
    pub headers: RequestHeaders,
    pub fragment_timeout: Duration,
    pub init_timeout: Duration,
    pub min_payload_bytes: u64,
    pub revalidate_existing: bool,
}

impl FetchSettings {
    pub fn from_config(cfg: &SegfetchConfig) -> Self {
        Self {
            concurrency: cfg.concurrency.max(1),
            policy: cfg.retry_policy(),
            headers: cfg.request_headers(),
            fragment_timeout: cfg.fragment_timeout(),
            init_timeout: cfg.manifest_timeout(),
            min_payload_bytes: cfg.min_payload_bytes,
            revalidate_existing: cfg.revalidate_existing,
        }
    }
}

/// Outcome of the fetch phase, keyed by fragment (init first).
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub outcomes: BTreeMap<FragmentKey, FetchOutcome>,
    /// Fragments that were already on disk.
    pub resumed: BTreeSet<FragmentKey>,
}

impl FetchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> Vec<FragmentKey> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn bytes_written(&self) -> u64 {
        self.outcomes
            .values()
            .map(|o| match o {
                FetchOutcome::Success { bytes_written } => *bytes_written,
                _ => 0,
            })
            .sum()
    }

    pub fn init_failed(&self) -> bool {
        self.outcomes
            .get(&FragmentKey::Init)
            .is_some_and(|o| !o.is_success())
    }
}

/// State shared by every worker thread.
pub(crate) struct Shared {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    settings: FetchSettings,
    layout: AssetLayout,
}

pub struct FragmentFetcher {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    settings: FetchSettings,
}

impl FragmentFetcher {
    pub fn new(transport: Arc<dyn Transport>, settings: FetchSettings) -> Self {
        Self {
            transport,
            sleeper: Arc::new(ThreadSleeper),
            settings,
        }
    }

    /// Replace the backoff sleeper (tests record delays instead of waiting).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn shared(&self, layout: &AssetLayout) -> Arc<Shared> {
        Arc::new(Shared {
            transport: Arc::clone(&self.transport),
            sleeper: Arc::clone(&self.sleeper),
            settings: self.settings.clone(),
            layout: layout.clone(),
        })
    }

    /// One attempt for one descriptor, no retry and no resume check.
    pub fn fetch_once(&self, descriptor: &FragmentDescriptor, layout: &AssetLayout) -> FetchOutcome {
        let shared = self.shared(layout);
        let path = layout.fragment_path(descriptor);
        match fragment::attempt_once(&shared, descriptor, &path) {
            Ok(bytes_written) => FetchOutcome::Success { bytes_written },
            Err(e) => e.into(),
        }
    }

    /// Fetches every descriptor into `layout`, at most `concurrency` at a time.
    /// If `progress_tx` is `Some`, a snapshot is sent after each resolved descriptor.
    /// Intermediate snapshots are dropped while the channel is full; the final
    /// one goes through a slot reserved up front, so a consumer that reads late
    /// still ends on the complete snapshot.
    pub fn fetch_all(
        &self,
        descriptors: &[FragmentDescriptor],
        layout: &AssetLayout,
        progress_tx: Option<&tokio::sync::mpsc::Sender<FetchProgress>>,
    ) -> FetchReport {
        let mut report = FetchReport::default();
        let count = descriptors.len();
        if count == 0 {
            return report;
        }

        let shared = self.shared(layout);
        let work: Arc<Mutex<VecDeque<FragmentDescriptor>>> =
            Arc::new(Mutex::new(descriptors.iter().cloned().collect()));
        let (tx, rx) = mpsc::channel();
        let num_workers = self.settings.concurrency.max(1).min(count);
        tracing::info!(fragments = count, workers = num_workers, "fetch phase started");

        let mut handles = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let work = Arc::clone(&work);
            let tx = tx.clone();
            let shared = Arc::clone(&shared);
            handles.push(std::thread::spawn(move || loop {
                let next = work.lock().unwrap_or_else(|p| p.into_inner()).pop_front();
                let Some(descriptor) = next else {
                    break;
                };
                let span = tracing::info_span!("fragment", key = %descriptor.key);
                let result = span.in_scope(|| fragment::fetch_fragment(&shared, &descriptor));
                if tx.send((descriptor.key, result)).is_err() {
                    break;
                }
            }));
        }
        drop(tx);

        // Held back for the final snapshot.
        let final_slot = progress_tx.and_then(|tx| tx.try_reserve().ok());

        let mut progress = FetchProgress::new(count);
        for (key, result) in rx.iter() {
            progress.done += 1;
            if result.resumed {
                progress.resumed += 1;
                report.resumed.insert(key);
            }
            match &result.outcome {
                FetchOutcome::Success { bytes_written } => progress.bytes_written += bytes_written,
                _ => progress.failed += 1,
            }
            report.outcomes.insert(key, result.outcome);

            if progress.should_log_at_info() {
                tracing::info!(done = progress.done, total = count, failed = progress.failed, "fetch progress");
            } else {
                tracing::debug!(done = progress.done, total = count, "fetch progress");
            }
            if progress.is_complete() {
                continue;
            }
            if let Some(progress_tx) = progress_tx {
                let _ = progress_tx.try_send(progress.clone());
            }
        }

        for h in handles {
            if h.join().is_err() {
                tracing::error!("fetch worker panicked");
            }
        }

        // A panicked worker loses its in-flight descriptor; record it rather than drop it.
        for d in descriptors {
            if report.outcomes.contains_key(&d.key) {
                continue;
            }
            report.outcomes.insert(
                d.key,
                FetchOutcome::PermanentFailure {
                    attempts: 0,
                    last_error: "fetch worker exited before finishing".to_string(),
                },
            );
            progress.done += 1;
            progress.failed += 1;
        }

        match final_slot {
            Some(permit) => permit.send(progress),
            None => {
                if let Some(progress_tx) = progress_tx {
                    if progress_tx.try_send(progress).is_err() {
                        tracing::debug!("progress channel full or closed, final snapshot not sent");
                    }
                }
            }
        }

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failure_count(),
            resumed = report.resumed.len(),
            bytes = report.bytes_written(),
            "fetch phase finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Request, Response, TransportError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory transport: URL → (status, body); unknown URLs fail to connect.
    #[derive(Default)]
    struct FakeTransport {
        routes: HashMap<String, (u32, Vec<u8>)>,
        calls: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeTransport {
        fn route(mut self, url: &str, status: u32, body: &[u8]) -> Self {
            self.routes.insert(url.to_string(), (status, body.to_vec()));
            self
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, request: &Request<'_>) -> Result<Response, TransportError> {
            *self.calls.lock().unwrap().entry(request.url.to_string()).or_default() += 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match self.routes.get(request.url) {
                Some((status, body)) => Ok(Response {
                    status: *status,
                    body: body.clone(),
                }),
                None => Err(TransportError::Connection(format!("no route to {}", request.url))),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSleeper(Mutex<Vec<Duration>>);

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, delay: Duration) {
            self.0.lock().unwrap().push(delay);
        }
    }

    fn settings(concurrency: usize) -> FetchSettings {
        let mut s = FetchSettings::from_config(&SegfetchConfig::default());
        s.concurrency = concurrency;
        s.min_payload_bytes = 4;
        s
    }

    fn fetcher(transport: &Arc<FakeTransport>, concurrency: usize) -> (FragmentFetcher, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let t: Arc<dyn Transport> = transport.clone();
        let f = FragmentFetcher::new(t, settings(concurrency)).with_sleeper(sleeper.clone());
        (f, sleeper)
    }

    fn media(i: u32) -> FragmentDescriptor {
        FragmentDescriptor::media(i, format!("http://cdn/{i}.m4s"), ".m4s")
    }

    #[test]
    fn file_exists_iff_success() {
        let transport = Arc::new(
            FakeTransport::default()
                .route("http://cdn/init.mp4", 200, b"INIT")
                .route("http://cdn/1.m4s", 200, b"AAAA")
                .route("http://cdn/2.m4s", 404, b"not found page")
                .route("http://cdn/3.m4s", 200, b"CCCC"),
        );
        let (f, _) = fetcher(&transport, 2);
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), "movie");
        let descriptors = vec![
            FragmentDescriptor::init("http://cdn/init.mp4", ".mp4"),
            media(1),
            media(2),
            media(3),
            media(4),
        ];

        let report = f.fetch_all(&descriptors, &layout, None);

        assert_eq!(report.outcomes.len(), 5);
        for d in &descriptors {
            let exists = layout.fragment_path(d).exists();
            assert_eq!(exists, report.outcomes[&d.key].is_success(), "{}", d.key);
        }
        assert_eq!(report.failed(), vec![FragmentKey::Media(2), FragmentKey::Media(4)]);
        assert_eq!(report.bytes_written(), 12);
        assert!(!report.init_failed());
    }

    #[test]
    fn existing_file_short_circuits_network() {
        let transport = Arc::new(FakeTransport::default().route("http://cdn/1.m4s", 200, b"AAAA"));
        let (f, _) = fetcher(&transport, 4);
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), "movie");
        std::fs::write(layout.fragment_path(&media(1)), b"old").unwrap();

        let report = f.fetch_all(&[media(1)], &layout, None);

        assert_eq!(transport.total_calls(), 0);
        assert_eq!(
            report.outcomes[&FragmentKey::Media(1)],
            FetchOutcome::Success { bytes_written: 0 }
        );
        assert!(report.resumed.contains(&FragmentKey::Media(1)));
        // Content is trusted as-is on resume.
        assert_eq!(std::fs::read(layout.fragment_path(&media(1))).unwrap(), b"old");
    }

    #[test]
    fn revalidate_existing_refetches_undersized_file() {
        let transport = Arc::new(FakeTransport::default().route("http://cdn/1.m4s", 200, b"AAAA"));
        let sleeper = Arc::new(RecordingSleeper::default());
        let mut s = settings(1);
        s.revalidate_existing = true;
        let t: Arc<dyn Transport> = transport.clone();
        let f = FragmentFetcher::new(t, s).with_sleeper(sleeper);
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), "movie");
        std::fs::write(layout.fragment_path(&media(1)), b"").unwrap();

        let report = f.fetch_all(&[media(1)], &layout, None);

        assert_eq!(transport.calls("http://cdn/1.m4s"), 1);
        assert!(report.resumed.is_empty());
        assert_eq!(std::fs::read(layout.fragment_path(&media(1))).unwrap(), b"AAAA");
    }

    #[test]
    fn always_failing_fragment_is_attempted_max_attempts_times() {
        let transport = Arc::new(FakeTransport::default().route("http://cdn/1.m4s", 200, b"x"));
        let (f, sleeper) = fetcher(&transport, 1);
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), "movie");

        let report = f.fetch_all(&[media(1)], &layout, None);

        assert_eq!(transport.calls("http://cdn/1.m4s"), 3);
        match &report.outcomes[&FragmentKey::Media(1)] {
            FetchOutcome::PermanentFailure { attempts, last_error } => {
                assert_eq!(*attempts, 3);
                assert!(last_error.contains("too small"), "{last_error}");
            }
            other => panic!("expected PermanentFailure, got {other:?}"),
        }
        let delays = sleeper.0.lock().unwrap().clone();
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert!(!layout.fragment_path(&media(1)).exists());
    }

    #[test]
    fn concurrency_bound_is_enforced() {
        let mut fake = FakeTransport::default();
        for i in 1..=20 {
            fake = fake.route(&format!("http://cdn/{i}.m4s"), 200, b"DATA");
        }
        let transport = Arc::new(fake);
        let (f, _) = fetcher(&transport, 3);
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), "movie");
        let descriptors: Vec<_> = (1..=20).map(media).collect();

        let report = f.fetch_all(&descriptors, &layout, None);

        assert_eq!(report.succeeded(), 20);
        assert!(transport.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn progress_snapshots_are_sent() {
        let transport = Arc::new(
            FakeTransport::default()
                .route("http://cdn/1.m4s", 200, b"AAAA")
                .route("http://cdn/2.m4s", 200, b"BBBB"),
        );
        let (f, _) = fetcher(&transport, 2);
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), "movie");
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);

        f.fetch_all(&[media(1), media(2)], &layout, Some(&tx));
        drop(tx);

        let mut last = None;
        while let Ok(p) = rx.try_recv() {
            last = Some(p);
        }
        let last = last.expect("at least one snapshot");
        assert_eq!(last.done, 2);
        assert_eq!(last.total, 2);
        assert_eq!(last.bytes_written, 8);
        assert!(last.is_complete());
    }

    #[test]
    fn final_snapshot_survives_undrained_channel() {
        let transport = Arc::new(FakeTransport::default());
        let (f, _) = fetcher(&transport, 8);
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), "movie");
        let descriptors: Vec<_> = (1..=200).map(media).collect();
        for d in &descriptors {
            std::fs::write(layout.fragment_path(d), b"DONE").unwrap();
        }
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);

        let report = f.fetch_all(&descriptors, &layout, Some(&tx));
        drop(tx);

        assert_eq!(transport.total_calls(), 0);
        assert_eq!(report.resumed.len(), 200);
        let mut received = Vec::new();
        while let Ok(p) = rx.try_recv() {
            received.push(p);
        }
        assert!(received.len() <= 4);
        let last = received.last().expect("final snapshot");
        assert!(last.is_complete());
        assert_eq!(last.done, 200);
        assert_eq!(last.resumed, 200);
        assert_eq!(last.total, 200);
    }

    #[test]
    fn fetch_once_classifies_single_attempt() {
        let transport = Arc::new(
            FakeTransport::default()
                .route("http://cdn/1.m4s", 200, b"x")
                .route("http://cdn/2.m4s", 500, b"server error"),
        );
        let (f, _) = fetcher(&transport, 1);
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), "movie");

        assert!(matches!(f.fetch_once(&media(1), &layout), FetchOutcome::RejectedPayload(_)));
        assert!(matches!(f.fetch_once(&media(2), &layout), FetchOutcome::TransportFailure(_)));
        assert!(matches!(f.fetch_once(&media(3), &layout), FetchOutcome::TransportFailure(_)));
    }

    #[test]
    fn empty_descriptor_list_returns_empty_report() {
        let transport = Arc::new(FakeTransport::default());
        let (f, _) = fetcher(&transport, 2);
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), "movie");
        let report = f.fetch_all(&[], &layout, None);
        assert!(report.outcomes.is_empty());
    }
}
