//! `segfetch fetch` – download, audit and merge one asset.

use anyhow::Result;
use segfetch_core::config::SegfetchConfig;
use segfetch_core::fetcher::FetchProgress;
use segfetch_core::gaps;
use segfetch_core::pipeline::{JobSpec, Pipeline};
use segfetch_core::transport::CurlTransport;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const PROGRESS_INTERVAL_MS: u128 = 250;

pub async fn run_fetch(
    cfg: SegfetchConfig,
    url: String,
    base_name: Option<String>,
    output_root: PathBuf,
) -> Result<()> {
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<FetchProgress>(64);
    let progress_handle = tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        let mut printed = false;
        while let Some(p) = progress_rx.recv().await {
            let due = last_print.map_or(true, |t| t.elapsed().as_millis() >= PROGRESS_INTERVAL_MS);
            if due || p.is_complete() {
                eprint!(
                    "\r  {}/{} fragments ({:.1}%)  {} failed  {} resumed  {:.1} MiB  ",
                    p.done,
                    p.total,
                    p.fraction() * 100.0,
                    p.failed,
                    p.resumed,
                    p.bytes_written as f64 / 1_048_576.0
                );
                let _ = std::io::stderr().flush();
                last_print = Some(Instant::now());
                printed = true;
            }
        }
        if printed {
            eprintln!();
        }
    });

    let job = JobSpec {
        manifest_url: url,
        base_name,
        output_root,
    };
    let transport = Arc::new(CurlTransport::new(cfg.connect_timeout()));
    let result = tokio::task::spawn_blocking(move || {
        let pipeline = Pipeline::new(transport, cfg);
        pipeline.run_job(&job, Some(&progress_tx))
    })
    .await;
    let _ = progress_handle.await;
    let report = result??;

    let failed = report.fetch.failed();
    if !failed.is_empty() {
        let keys: Vec<String> = failed.iter().map(ToString::to_string).collect();
        println!("Failed fragments ({}): {}", failed.len(), keys.join(", "));
    }
    if let Some(missing) = report.gaps.as_deref().filter(|m| !m.is_empty()) {
        println!("Missing fragments ({}): {}", missing.len(), gaps::format_indices(missing));
    }
    if !report.merge.skipped.is_empty() {
        println!("Skipped during merge: {}", gaps::format_indices(&report.merge.skipped));
    }
    println!(
        "Merged {} fragment(s), {:.1} MiB in {:.1}s",
        report.merge.appended.len(),
        report.merge.bytes_written as f64 / 1_048_576.0,
        report.elapsed.as_secs_f64()
    );
    println!("{}  {}", report.merge.sha256, report.merge.output.display());
    Ok(())
}
