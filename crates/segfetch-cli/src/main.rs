use clap::Parser;
use segfetch_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Per-run log file; stderr if the state dir is not writable.
    if let Err(e) = logging::init_logging(cli.debug) {
        logging::init_logging_stderr(cli.debug);
        tracing::warn!("file logging unavailable, using stderr: {e:#}");
    }

    if let Err(err) = cli.run().await {
        tracing::error!("{err:#}");
        eprintln!("segfetch error: {:#}", err);
        std::process::exit(1);
    }
}
