//! `segfetch merge` – concatenate fragments already on disk.

use anyhow::Result;
use segfetch_core::merge::{merge_fragments, MergeOptions};
use segfetch_core::storage::AssetLayout;
use std::path::PathBuf;

pub async fn run_merge(dir: PathBuf, base: String, delete_sources: bool) -> Result<()> {
    let layout = AssetLayout::new(dir, base);
    let options = MergeOptions {
        delete_sources,
        ..MergeOptions::default()
    };
    let report = tokio::task::spawn_blocking(move || merge_fragments(&layout, &options)).await??;

    if !report.skipped.is_empty() {
        println!("Skipped {} vanished fragment(s).", report.skipped.len());
    }
    if let Some(cleanup) = &report.cleanup {
        if !cleanup.failed.is_empty() {
            println!("Could not delete {} source file(s).", cleanup.failed.len());
        }
    }
    println!("{}  {}", report.sha256, report.output.display());
    Ok(())
}
