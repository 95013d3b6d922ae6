//! Retry backoff for failed payout attempts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff with a deterministic jitter.
///
/// Jitter is derived from the attempt number rather than a RNG so the same
/// schedule reproduces across workers and in tests.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub base: Duration,
    /// Cap applied before jitter.
    pub cap: Duration,
    /// Jitter factor, 0.0–1.0.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            cap: Duration::from_secs(3_600),
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// Delay before the next try after `attempt` failed attempts (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base.as_millis() as f64;
        let max_ms = self.cap.as_millis() as f64;
        let exp = 2_f64.powi(attempt.saturating_sub(1) as i32);
        let delay_ms = (base_ms * exp).min(max_ms);

        let jitter_range = delay_ms * self.jitter;
        let jitter = if jitter_range > 0.0 {
            let pseudo_random = ((attempt as f64 * 17.0) % 100.0) / 100.0;
            jitter_range * (pseudo_random - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_the_cap() {
        let backoff = Backoff {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(10),
            jitter: 0.0,
        };

        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(backoff.delay_for_attempt(10), Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_means_no_delay() {
        assert_eq!(Backoff::default().delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn jitter_is_deterministic() {
        let backoff = Backoff::default();
        assert_eq!(
            backoff.delay_for_attempt(3),
            backoff.delay_for_attempt(3)
        );
    }
}
