//! Retry and backoff policy.
//!
//! Classifies per-attempt fragment errors and decides how long to wait before
//! the next attempt, so the worker pool applies one policy uniformly and
//! independently of the transport.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::classify;
pub use error::FragmentError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, Exhausted, Sleeper, ThreadSleeper};
