//! `segfetch check` – gap audit of an asset folder.

use anyhow::{Context, Result};
use segfetch_core::gaps;
use segfetch_core::storage::AssetLayout;
use std::path::Path;

pub fn run_check(dir: &Path, base: &str) -> Result<()> {
    let layout = AssetLayout::new(dir, base);
    let observed = gaps::persisted_media_indices(&layout)
        .with_context(|| format!("scan {}", dir.display()))?;
    if observed.is_empty() {
        println!("No fragments named '{base}_seg_NNNN' in {}.", dir.display());
        return Ok(());
    }
    let missing = gaps::missing_in_observed_range(&observed);
    if missing.is_empty() {
        println!("{} fragments, no gaps.", observed.len());
    } else {
        println!(
            "{} fragments, {} missing: {}",
            observed.len(),
            missing.len(),
            gaps::format_indices(&missing)
        );
    }
    Ok(())
}
