use super::policy::BackOffPolicy;
use crate::context::RetryContext;
use rand::Rng;
use std::time::Duration;

/// Pauses for a uniformly random period in `[min_delay, max_delay]`.
#[derive(Debug, Clone, Copy)]
pub struct UniformRandomBackOffPolicy {
    min_delay: Duration,
    max_delay: Duration,
}

impl UniformRandomBackOffPolicy {
    /// Create a policy; bounds given in the wrong order are swapped.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay: min_delay.min(max_delay),
            max_delay: min_delay.max(max_delay),
        }
    }

    /// Lower bound of the pause.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Upper bound of the pause.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for UniformRandomBackOffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_millis(1500))
    }
}

impl BackOffPolicy for UniformRandomBackOffPolicy {
    fn next_delay(&self, _context: &RetryContext) -> Option<Duration> {
        if self.min_delay == self.max_delay {
            return Some(self.min_delay);
        }
        let secs = rand::thread_rng()
            .gen_range(self.min_delay.as_secs_f64()..=self.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_within_bounds() {
        let policy = UniformRandomBackOffPolicy::new(Duration::from_millis(10), Duration::from_millis(20));
        let ctx = RetryContext::new(None, None);

        for _ in 0..50 {
            let delay = policy.next_delay(&ctx).unwrap();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_bounds_are_ordered() {
        let policy = UniformRandomBackOffPolicy::new(Duration::from_millis(20), Duration::from_millis(10));
        assert_eq!(policy.min_delay(), Duration::from_millis(10));
        assert_eq!(policy.max_delay(), Duration::from_millis(20));
    }

    #[test]
    fn test_degenerate_range() {
        let policy = UniformRandomBackOffPolicy::new(Duration::from_millis(7), Duration::from_millis(7));
        let ctx = RetryContext::new(None, None);
        assert_eq!(policy.next_delay(&ctx), Some(Duration::from_millis(7)));
    }
}
