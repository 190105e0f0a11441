//! CLI for segfetch.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use segfetch_core::config::{self, RetryConfig, SegfetchConfig};
use std::path::PathBuf;

use commands::{run_check, run_fetch, run_merge};

/// Top-level CLI for segfetch.
#[derive(Debug, Parser)]
#[command(name = "segfetch")]
#[command(about = "Download the fragments of a segmented stream and merge them into one file", long_about = None)]
pub struct Cli {
    /// Verbose logging (debug level for every target).
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch every fragment listed by a manifest, audit gaps, and merge.
    Fetch {
        /// URL of the media playlist (.m3u8).
        url: String,

        /// Base name for the asset; guessed from the URL if omitted.
        #[arg(short = 'o', long = "output", value_name = "BASE")]
        output: Option<String>,

        /// Root directory for asset folders (default: current directory).
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Keep fragment files after merging.
        #[arg(long)]
        skip_cleanup: bool,

        /// Skip the gap audit between fetch and merge.
        #[arg(long)]
        skip_check: bool,

        /// Concurrent fragment fetches (overrides config).
        #[arg(short = 'j', long, value_name = "N")]
        jobs: Option<usize>,

        /// Attempts per fragment, including the first (overrides config).
        #[arg(long, value_name = "K")]
        retries: Option<u32>,
    },

    /// Report missing fragment indices in an asset folder.
    Check {
        /// Asset folder holding `{base}_seg_NNNN` files.
        dir: PathBuf,
        /// Asset base name.
        base: String,
    },

    /// Merge fragments already on disk into `{base}_merged`.
    Merge {
        /// Asset folder holding the fragment files.
        dir: PathBuf,
        /// Asset base name.
        base: String,
        /// Keep fragment files after merging.
        #[arg(long)]
        skip_cleanup: bool,
    },
}

/// Command-line overrides layered on top of the loaded config.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub jobs: Option<usize>,
    pub retries: Option<u32>,
    pub skip_cleanup: bool,
    pub skip_check: bool,
}

impl Overrides {
    pub fn apply(self, mut cfg: SegfetchConfig) -> SegfetchConfig {
        if let Some(jobs) = self.jobs {
            cfg.concurrency = jobs.max(1);
        }
        if let Some(retries) = self.retries {
            let retry = cfg.retry.take().unwrap_or_default();
            cfg.retry = Some(RetryConfig {
                max_attempts: retries.max(1),
                ..retry
            });
        }
        if self.skip_cleanup {
            cfg.delete_sources = false;
        }
        if self.skip_check {
            cfg.check_gaps = false;
        }
        cfg
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            CliCommand::Fetch {
                url,
                output,
                output_dir,
                skip_cleanup,
                skip_check,
                jobs,
                retries,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let cfg = Overrides {
                    jobs,
                    retries,
                    skip_cleanup,
                    skip_check,
                }
                .apply(cfg);
                let output_root = match output_dir {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                run_fetch(cfg, url, output, output_root).await?;
            }
            CliCommand::Check { dir, base } => run_check(&dir, &base)?,
            CliCommand::Merge {
                dir,
                base,
                skip_cleanup,
            } => run_merge(dir, base, !skip_cleanup).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
