//! Exponential back-off with jitter.

use super::policy::BackOffPolicy;
use crate::context::RetryContext;
use std::time::Duration;

/// Exponential back-off with configurable jitter.
///
/// Delays between retries increase exponentially: `initial_delay * multiplier^n`,
/// capped at `max_delay`. Jitter is added to prevent thundering herd problems.
///
/// # Mathematical Formula
///
/// For retry `n` (0 after the first failure, i.e. `n = attempt_count - 1`):
/// ```text
/// base_delay = min(initial_delay * (multiplier ^ n), max_delay)
/// jitter_range = base_delay * jitter
/// jittered = base_delay + random(-jitter_range, +jitter_range)
/// final_delay = clamp(jittered, 0, max_delay)
/// ```
///
/// # Examples
///
/// ```rust
/// use rebound_core::backoff::ExponentialBackOffPolicy;
/// use std::time::Duration;
///
/// // Default configuration (initial=100ms, max=60s, multiplier=2.0, jitter=0.1)
/// let backoff = ExponentialBackOffPolicy::default();
///
/// // Custom configuration
/// let backoff = ExponentialBackOffPolicy::builder()
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(30))
///     .multiplier(2.0)
///     .jitter(0.1)
///     .build();
/// ```
///
/// The policy is stateless: the delay is derived from the context's attempt
/// count, so one instance can serve many concurrent executions.
#[derive(Debug, Clone)]
pub struct ExponentialBackOffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
}

impl ExponentialBackOffPolicy {
    /// Create a new builder for configuring exponential back-off.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rebound_core::backoff::ExponentialBackOffPolicy;
    /// use std::time::Duration;
    ///
    /// let backoff = ExponentialBackOffPolicy::builder()
    ///     .initial_delay(Duration::from_millis(100))
    ///     .build();
    /// ```
    pub fn builder() -> ExponentialBackOffPolicyBuilder {
        ExponentialBackOffPolicyBuilder::default()
    }

    /// Delay before retry number `retry` (0-indexed).
    ///
    /// Never exceeds `max_delay`, however large `retry` or the multiplier is.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let max_secs = self.max_delay.as_secs_f64();
        let exponent = retry.min(i32::MAX as u32) as i32;
        let raw = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let base_delay = if raw.is_finite() { raw.min(max_secs) } else { max_secs };

        // Jitter is applied as: base * jitter * random(-1.0, +1.0)
        let jittered = if self.jitter > 0.0 {
            let jitter_amount = base_delay * self.jitter * (rand::random::<f64>() - 0.5) * 2.0;
            base_delay + jitter_amount
        } else {
            base_delay
        };

        Duration::try_from_secs_f64(jittered.clamp(0.0, max_secs)).unwrap_or(self.max_delay)
    }
}

impl Default for ExponentialBackOffPolicy {
    /// Create an exponential back-off with sensible defaults.
    ///
    /// Defaults:
    /// - `initial_delay`: 100ms
    /// - `max_delay`: 60s
    /// - `multiplier`: 2.0 (doubles each time)
    /// - `jitter`: 0.1 (10% randomization)
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackOffPolicy for ExponentialBackOffPolicy {
    fn next_delay(&self, context: &RetryContext) -> Option<Duration> {
        let retry = context.attempt_count().saturating_sub(1);
        Some(self.delay_for_retry(retry))
    }
}

/// Builder for configuring [`ExponentialBackOffPolicy`].
#[derive(Debug, Default)]
pub struct ExponentialBackOffPolicyBuilder {
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<f64>,
}

impl ExponentialBackOffPolicyBuilder {
    /// Set the delay before the first retry.
    ///
    /// Default: 100ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the maximum delay between retries.
    ///
    /// Default: 60s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the exponential multiplier. Values below 1.0 are raised to 1.0.
    ///
    /// Default: 2.0 (doubles each time)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rebound_core::backoff::ExponentialBackOffPolicy;
    ///
    /// let backoff = ExponentialBackOffPolicy::builder()
    ///     .multiplier(1.5)  // More gradual backoff
    ///     .build();
    /// ```
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier.max(1.0));
        self
    }

    /// Set the jitter factor (0.0 to 1.0).
    ///
    /// A jitter of 0.1 means the delay can vary by ±10%.
    ///
    /// Default: 0.1
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter.clamp(0.0, 1.0));
        self
    }

    /// Build the policy, using defaults for any unset parameter.
    pub fn build(self) -> ExponentialBackOffPolicy {
        let defaults = ExponentialBackOffPolicy::default();
        ExponentialBackOffPolicy {
            initial_delay: self.initial_delay.unwrap_or(defaults.initial_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}
