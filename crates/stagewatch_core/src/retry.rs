use std::time::Duration;

/// Whether a successful (re)open forgives earlier failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    /// Backoff keeps growing across the whole subscription.
    #[default]
    Never,
    /// Every successful open resets the attempt counter to zero.
    OnOpen,
}

/// Reconnect policy. Pure: no clocks, no I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub cap_delay: Duration,
    pub max_attempts: u32,
    pub reset: ResetPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            cap_delay: Duration::from_secs(30),
            max_attempts: 5,
            reset: ResetPolicy::Never,
        }
    }
}

/// Reconnect attempts consumed so far by one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub attempt: u32,
    pub max_attempts: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

impl RetryPolicy {
    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(self.max_attempts)
    }

    pub fn should_retry(&self, budget: &RetryBudget) -> bool {
        !budget.is_exhausted()
    }

    /// `min(base * 2^attempt, cap)` using the attempt count before it is bumped.
    pub fn next_delay(&self, budget: &RetryBudget) -> Duration {
        let factor = 1u32.checked_shl(budget.attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.cap_delay, |delay| delay.min(self.cap_delay))
    }

    /// Consumes one attempt and returns its delay, or `None` once the budget is spent.
    pub fn schedule(&self, budget: &mut RetryBudget) -> Option<Duration> {
        if !self.should_retry(budget) {
            return None;
        }
        let delay = self.next_delay(budget);
        budget.attempt += 1;
        Some(delay)
    }
}
