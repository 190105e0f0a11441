use std::time::Duration;

/// High-level classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No usable response: transport error or a status other than 200/206.
    TransportFailure,
    /// Response accepted by status but the payload failed validation.
    RejectedPayload,
    /// Local write failure; retrying the network won't help.
    Storage,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Bounded attempts with linear backoff.
///
/// Attempt `n` (1-based) that fails waits `n * backoff_base` before attempt
/// `n + 1`. No jitter and no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Backoff unit.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt.max(1))
    }

    /// Decide what to do after attempt `attempt` (1-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        match kind {
            ErrorKind::Storage => RetryDecision::NoRetry,
            ErrorKind::TransportFailure | ErrorKind::RejectedPayload => {
                RetryDecision::RetryAfter(self.backoff(attempt))
            }
        }
    }
}
