//! Segmented media fetcher: pulls the fragments listed by an HLS-style
//! manifest with bounded concurrency, retries and validates each one, audits
//! the result for gaps and concatenates everything into a single file.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod gaps;
pub mod logging;
pub mod merge;
pub mod naming;
pub mod pipeline;
pub mod playlist;
pub mod registry;
pub mod retry;
pub mod storage;
pub mod transport;
pub mod validate;

pub use error::SegfetchError;
