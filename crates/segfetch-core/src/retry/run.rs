//! Retry loop: run a closure until success or policy says stop.

use std::time::Duration;

use super::classify;
use super::error::FragmentError;
use super::policy::{RetryDecision, RetryPolicy};

/// Blocks the current worker between attempts. Injected so tests can record
/// delays instead of waiting.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration);
}

/// Real sleep on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Returned when the policy gives up.
#[derive(Debug)]
pub struct Exhausted {
    /// Attempts actually made.
    pub attempts: u32,
    /// Error from the last attempt.
    pub last: FragmentError,
}

/// Runs `f(attempt)` until it succeeds or the retry policy says to stop.
/// `attempt` is 1-based. On retryable failure, sleeps for the backoff then tries again.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut f: F,
) -> Result<T, Exhausted>
where
    F: FnMut(u32) -> Result<T, FragmentError>,
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        return Err(Exhausted {
                            attempts: attempt,
                            last: e,
                        })
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(
                            attempt,
                            max_attempts = policy.max_attempts,
                            kind = ?kind,
                            delay_ms = d.as_millis() as u64,
                            error = %e,
                            "attempt failed, backing off"
                        );
                        sleeper.sleep(d);
                        attempt += 1;
                    }
                }
            }
        }
    }
}
