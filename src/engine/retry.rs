//! Retry schedules shared by the return executor and the bots.

use backoff::ExponentialBackoff;
use std::time::Duration;

/// Deterministic doubling schedule starting at `initial`, without jitter and
/// without an elapsed-time cap. Callers bound the number of retries.
pub fn doubling_backoff(initial: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: initial,
        initial_interval: initial,
        randomization_factor: 0.0,
        multiplier: 2.0,
        max_interval: Duration::from_secs(3600),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    }
}

/// Consecutive-error counter: `base * 2^(n-1)` after the n-th error in a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorStreak {
    consecutive: u32,
}

impl ErrorStreak {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more failure and return the new streak length.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn is_active(&self) -> bool {
        self.consecutive > 0
    }

    pub fn exhausted(&self, max_consecutive: u32) -> bool {
        self.consecutive >= max_consecutive
    }

    pub fn delay(&self, base: Duration) -> Duration {
        if self.consecutive == 0 {
            return Duration::ZERO;
        }
        let exponent = (self.consecutive - 1).min(16);
        base.saturating_mul(1u32 << exponent)
    }
}
