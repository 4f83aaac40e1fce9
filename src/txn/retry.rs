//! Commit retry policy.
//!
//! Conflicting atomic commits are re-run with exponential backoff. The
//! delays carry jitter so two transactions that keep colliding on the
//! same key do not fall into lockstep.

use std::time::Duration;

use rand::Rng;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Returns the total attempt budget (first run included).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the backoff before re-running attempt `attempt + 1`.
    ///
    /// Delays grow as base * multiplier^(attempt - 1), capped at the
    /// configured maximum. With jitter enabled the delay is scaled by a
    /// random factor in [0.5, 1.0].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let delay = Duration::from_secs_f64(capped);

        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }
}

impl Default for RetryPolicy {
    /// Five attempts, 10ms base, doubling, capped at 200ms.
    ///
    /// The dominant workload is one player mutating their own few
    /// documents, so conflicts are rare and short; a small budget keeps
    /// the worst case well under typical request deadlines.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            multiplier: 2.0,
            max_delay: Duration::from_millis(200),
            jitter: true,
        }
    }
}
