//! The back-off contract and the constant-delay implementations.

use crate::context::RetryContext;
use std::sync::Arc;
use std::time::Duration;

/// Decides how long to pause between a failed attempt and the next one.
///
/// The engine asks for a delay once per retry, strictly after the retry
/// policy has allowed another attempt. Returning `None` means "do not back
/// off": the next attempt starts immediately. `Some(Duration::ZERO)` has the
/// same effect.
///
/// Implementations are shared between concurrent executions; derive any
/// per-execution state from the context (its attempt count, or attributes
/// stashed there).
///
/// # Examples
///
/// ```rust
/// use rebound_core::backoff::BackOffPolicy;
/// use rebound_core::context::RetryContext;
/// use std::time::Duration;
///
/// /// Waits 10ms per failed attempt so far.
/// struct Linear;
///
/// impl BackOffPolicy for Linear {
///     fn next_delay(&self, context: &RetryContext) -> Option<Duration> {
///         Some(Duration::from_millis(10) * context.attempt_count())
///     }
/// }
/// ```
pub trait BackOffPolicy: Send + Sync {
    /// Pause to observe before the next attempt.
    ///
    /// # Notes
    ///
    /// This is called AFTER a failure and BEFORE sleeping. After the first
    /// failure, `context.attempt_count()` is 1.
    fn next_delay(&self, context: &RetryContext) -> Option<Duration>;
}

impl<P: BackOffPolicy + ?Sized> BackOffPolicy for Arc<P> {
    fn next_delay(&self, context: &RetryContext) -> Option<Duration> {
        (**self).next_delay(context)
    }
}

impl<P: BackOffPolicy + ?Sized> BackOffPolicy for Box<P> {
    fn next_delay(&self, context: &RetryContext) -> Option<Duration> {
        (**self).next_delay(context)
    }
}

/// Retries immediately. This is the engine's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackOffPolicy;

impl BackOffPolicy for NoBackOffPolicy {
    fn next_delay(&self, _context: &RetryContext) -> Option<Duration> {
        None
    }
}

/// Pauses for the same period before every retry.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackOffPolicy {
    period: Duration,
}

impl FixedBackOffPolicy {
    /// Default pause between attempts.
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);

    /// Pause for `period` before each retry.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// The configured pause.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for FixedBackOffPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERIOD)
    }
}

impl BackOffPolicy for FixedBackOffPolicy {
    fn next_delay(&self, _context: &RetryContext) -> Option<Duration> {
        Some(self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_backoff_never_pauses() {
        let ctx = RetryContext::new(None, None);
        ctx.begin_attempt();
        assert_eq!(NoBackOffPolicy.next_delay(&ctx), None);
    }

    #[test]
    fn test_fixed_backoff_is_constant() {
        let policy = FixedBackOffPolicy::new(Duration::from_millis(250));
        let ctx = RetryContext::new(None, None);

        for _ in 0..4 {
            ctx.begin_attempt();
            assert_eq!(policy.next_delay(&ctx), Some(Duration::from_millis(250)));
        }
    }

    #[test]
    fn test_fixed_backoff_default() {
        assert_eq!(FixedBackOffPolicy::default().period(), Duration::from_secs(1));
    }
}
