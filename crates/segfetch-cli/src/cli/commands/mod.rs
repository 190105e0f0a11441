//! CLI command handlers, one per file.

mod check;
mod fetch;
mod merge;

pub use check::run_check;
pub use fetch::run_fetch;
pub use merge::run_merge;
