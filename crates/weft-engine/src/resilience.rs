//! Retry policy and failure classification

use std::{sync::LazyLock, time::Duration};

use regex::Regex;

/// Retry configuration for backend submissions
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Check if an error string looks retryable.
///
/// String fallback for errors that lost their type through wrapping; the
/// typed check on `weft_wire::Error::is_retryable` runs first.
pub fn is_retryable_error(error: &str) -> bool {
    // Rate limit errors
    if error.contains("429") || error.contains("rate limit") || error.contains("Rate limit") {
        return true;
    }
    // Transient network errors
    if error.contains("timeout") || error.contains("Timeout") {
        return true;
    }
    if error.contains("connection") || error.contains("Connection") {
        return true;
    }
    // Server errors (5xx)
    if error.contains("500")
        || error.contains("502")
        || error.contains("503")
        || error.contains("504")
    {
        return true;
    }
    // Overloaded
    if error.contains("overloaded") || error.contains("Overloaded") {
        return true;
    }
    false
}

/// Compiled patterns for backend rejections of a stale continuation token.
/// These are message signatures, not status codes: the rejection arrives as
/// a plain 400-class API error.
static STALE_CONTINUATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)previous_response_id",
        r"(?i)response not found",
        r"(?i)invalid response id",
        r"(?i)response id not found",
        r"(?i)no response found",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Check if an error indicates the continuation token no longer resolves.
/// The recovery is a one-shot full-history resubmission, never a plain retry.
pub fn is_stale_continuation(error: &str) -> bool {
    STALE_CONTINUATION_PATTERNS
        .iter()
        .any(|re| re.is_match(error))
}
