use std::time::Duration;

/// Strategy for the delay between stage attempts
pub trait BackoffPolicy: Send + Sync {
    /// Delay to wait after the given failed attempt (1-based)
    fn delay(&self, attempt: u32) -> Duration;
}

/// Fixed delay between attempts - the baseline policy
#[derive(Debug, Clone)]
pub struct FixedDelay(pub Duration);

impl BackoffPolicy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Exponential delay: `base * 2^(attempt-1)`, capped at `max`
#[derive(Debug, Clone)]
pub struct ExponentialDelay {
    pub base: Duration,
    pub max: Duration,
}

impl ExponentialDelay {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl BackoffPolicy for ExponentialDelay {
    fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        self.base
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_is_constant() {
        let policy = FixedDelay(Duration::from_secs(3));
        assert_eq!(policy.delay(1), Duration::from_secs(3));
        assert_eq!(policy.delay(5), Duration::from_secs(3));
    }

    #[test]
    fn exponential_delay_doubles_and_caps() {
        let policy = ExponentialDelay::new(Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(5), Duration::from_secs(10));
        assert_eq!(policy.delay(30), Duration::from_secs(10));
    }
}
