//! Retry budget and transient-failure classification for LM calls.
use std::time::Duration;

/// Substrings that mark a backend failure as worth retrying.
const TRANSIENT_MARKERS: &[&str] = &[
    "rate_limit",
    "ratelimit",
    "rate limit",
    "timeout",
    "timed out",
    "connection",
    "temporarily",
    "overloaded",
];

/// HTTP statuses worth retrying; matched only as whole numbers.
const TRANSIENT_STATUS_CODES: &[&str] = &["429", "500", "502", "503", "504"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first call. Always at least 1.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * delay` before the next call.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }

    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Whether a rendered backend error looks transient.
pub fn is_transient(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || lowered
            .split(|c: char| !c.is_ascii_digit())
            .any(|number| TRANSIENT_STATUS_CODES.contains(&number))
}
