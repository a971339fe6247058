//! Backoff timing and attempt budgets.

use std::time::Duration;

/// Exponential backoff between failed attempts against the same URL.
///
/// The delay after failed attempt `n` (1-based) is `base_delay * 2^n`,
/// capped at `max_delay`. Sleeps are polled in `poll_interval` slices so a
/// cancellation is observed within that granularity instead of after the
/// full delay.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(64),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl BackoffPolicy {
    /// Delay to sleep after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Attempt budget for the URL at `url_index` in a job's ordered list: the
/// primary gets the full retry budget, each fallback exactly one try.
pub fn attempts_for(url_index: usize, max_retries: u32) -> u32 {
    if url_index == 0 {
        max_retries.max(1)
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = BackoffPolicy::default();
        assert_eq!(p.delay_after(1), Duration::from_secs(2));
        assert_eq!(p.delay_after(2), Duration::from_secs(4));
        assert_eq!(p.delay_after(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped() {
        let p = BackoffPolicy::default();
        assert_eq!(p.delay_after(10), p.max_delay);
        assert_eq!(p.delay_after(31), p.max_delay);
    }

    #[test]
    fn primary_gets_the_retry_budget() {
        assert_eq!(attempts_for(0, 3), 3);
        assert_eq!(attempts_for(0, 0), 1);
    }

    #[test]
    fn fallbacks_get_one_attempt_each() {
        assert_eq!(attempts_for(1, 3), 1);
        assert_eq!(attempts_for(2, 10), 1);
    }
}
