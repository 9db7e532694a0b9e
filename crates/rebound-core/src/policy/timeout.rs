use super::RetryPolicy;
use crate::context::RetryContext;
use std::time::Duration;

/// Retries for as long as the execution is younger than `timeout`.
///
/// The clock starts when the engine creates the context, so time spent in
/// attempts and back-off pauses both count.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutRetryPolicy {
    timeout: Duration,
}

impl TimeoutRetryPolicy {
    /// Default retry window.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

    /// Retry while less than `timeout` has elapsed.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The configured retry window.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TimeoutRetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl RetryPolicy for TimeoutRetryPolicy {
    fn can_retry(&self, context: &RetryContext) -> bool {
        context.elapsed() <= self.timeout
    }
}
