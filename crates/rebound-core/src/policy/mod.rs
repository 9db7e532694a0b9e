//! Retry policies: decide whether another attempt may be made.
//!
//! A policy is consulted by the engine after every failed attempt (after the
//! `on_error` listeners have run). It must be a total, terminating function
//! with no I/O. Policies are shared across concurrent executions, so any
//! per-execution state belongs in the context's attribute bag.
//!
//! # Key Types
//!
//! - [`RetryPolicy`] - The decision contract
//! - [`SimpleRetryPolicy`] - Fixed attempt cap, optional error predicate
//! - [`TimeoutRetryPolicy`] - Retry while the execution is younger than a timeout
//! - [`CompositeRetryPolicy`] - Combine policies optimistically or pessimistically
//! - [`NeverRetryPolicy`], [`AlwaysRetryPolicy`] - The trivial cases

mod composite;
mod simple;
mod timeout;

pub use composite::CompositeRetryPolicy;
pub use simple::{AlwaysRetryPolicy, NeverRetryPolicy, SimpleRetryPolicy};
pub use timeout::TimeoutRetryPolicy;

use crate::context::RetryContext;
use std::sync::Arc;

/// Decides whether the engine may start another attempt.
///
/// # Examples
///
/// ```rust
/// use rebound_core::context::RetryContext;
/// use rebound_core::policy::RetryPolicy;
///
/// /// Retries only while fewer than two attempts were made.
/// struct TwoShots;
///
/// impl RetryPolicy for TwoShots {
///     fn can_retry(&self, context: &RetryContext) -> bool {
///         context.attempt_count() < 2
///     }
/// }
/// ```
pub trait RetryPolicy: Send + Sync {
    /// Whether another attempt is permitted given the current context.
    fn can_retry(&self, context: &RetryContext) -> bool;
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Arc<P> {
    fn can_retry(&self, context: &RetryContext) -> bool {
        (**self).can_retry(context)
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Box<P> {
    fn can_retry(&self, context: &RetryContext) -> bool {
        (**self).can_retry(context)
    }
}
