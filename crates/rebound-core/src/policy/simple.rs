//! Attempt-capped policies.

use super::RetryPolicy;
use crate::context::RetryContext;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

type Classifier = Arc<dyn Fn(&(dyn Error + Send + Sync + 'static)) -> bool + Send + Sync>;

/// Retries up to a fixed number of attempts in total.
///
/// With `max_attempts == 3` the operation runs at most three times: the
/// first attempt plus two retries. An optional predicate restricts retries
/// to errors it classifies as retryable; anything else exhausts immediately.
///
/// # Examples
///
/// ```rust
/// use rebound_core::policy::SimpleRetryPolicy;
///
/// let policy = SimpleRetryPolicy::new(5)
///     .retry_if(|err| err.to_string().contains("timeout"));
///
/// assert_eq!(policy.max_attempts(), 5);
/// ```
#[derive(Clone)]
pub struct SimpleRetryPolicy {
    max_attempts: u32,
    classifier: Option<Classifier>,
}

impl SimpleRetryPolicy {
    /// Default cap on the number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Allow at most `max_attempts` attempts, retrying every error.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            classifier: None,
        }
    }

    /// Only retry errors for which `predicate` returns `true`.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + Send + Sync + 'static)) -> bool + Send + Sync + 'static,
    {
        self.classifier = Some(Arc::new(predicate));
        self
    }

    /// The configured attempt cap.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn is_retryable(&self, context: &RetryContext) -> bool {
        match (&self.classifier, context.last_failure()) {
            (Some(classify), Some(failure)) => classify(&*failure),
            _ => true,
        }
    }
}

impl Default for SimpleRetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

impl fmt::Debug for SimpleRetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleRetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("classified", &self.classifier.is_some())
            .finish()
    }
}

impl RetryPolicy for SimpleRetryPolicy {
    fn can_retry(&self, context: &RetryContext) -> bool {
        context.attempt_count() < self.max_attempts && self.is_retryable(context)
    }
}

/// Never permits a retry: the operation runs exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetryPolicy;

impl RetryPolicy for NeverRetryPolicy {
    fn can_retry(&self, _context: &RetryContext) -> bool {
        false
    }
}

/// Always permits a retry. Pair it with a timeout or an exhausting listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetryPolicy;

impl RetryPolicy for AlwaysRetryPolicy {
    fn can_retry(&self, _context: &RetryContext) -> bool {
        true
    }
}
