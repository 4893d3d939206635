//! Retry budget and backoff shared by the pipeline's remote endpoints.

use std::time::Duration;

use rand::Rng;

/// Maximum number of retry attempts for transient remote failures.
pub(crate) const MAX_RETRY_ATTEMPTS: u32 = 5;
/// Initial backoff delay in milliseconds for exponential backoff.
pub(crate) const INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay in milliseconds to cap exponential growth.
pub(crate) const MAX_BACKOFF_MS: u64 = 60_000;

/// Calculates exponential backoff delay with full jitter.
///
/// Random value between 0 and min(max_backoff, base * 2^attempt), which spreads
/// retries out when many clients hit the same transient failure.
pub(crate) fn calculate_backoff(attempt: u32) -> Duration {
    let exponential = INITIAL_BACKOFF_MS
        .saturating_mul(1u64 << attempt.min(10))
        .min(MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=exponential);

    Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        for attempt in 0..20 {
            assert!(calculate_backoff(attempt) <= Duration::from_millis(MAX_BACKOFF_MS));
        }
    }
}
