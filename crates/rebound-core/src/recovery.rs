//! Fallback invoked once retries are exhausted.

use crate::context::RetryContext;

/// Produces a result after the last permitted attempt has failed.
///
/// Recovery runs at most once per execution, after every listener has been
/// closed. It sees the terminal context, whose
/// [`last_failure`](RetryContext::last_failure) is the final attempt's error.
/// A recovery error is handed to the caller as-is and never retried.
///
/// Plain closures taking `&RetryContext` implement this trait.
///
/// # Examples
///
/// ```rust
/// use rebound_core::prelude::*;
///
/// # async fn example() {
/// let template = RetryTemplate::default();
///
/// let value = template
///     .execute_with_recovery(
///         |_ctx| async { Err::<&str, _>(std::io::Error::other("down")) },
///         |ctx: &RetryContext| Ok(if ctx.attempt_count() == 3 { "cached" } else { "?" }),
///     )
///     .await
///     .unwrap();
///
/// assert_eq!(value, "cached");
/// # }
/// ```
pub trait RecoveryCallback<T, E>: Send + Sync {
    /// Compute the fallback result.
    fn recover(&self, context: &RetryContext) -> Result<T, E>;
}

impl<T, E, F> RecoveryCallback<T, E> for F
where
    F: Fn(&RetryContext) -> Result<T, E> + Send + Sync,
{
    fn recover(&self, context: &RetryContext) -> Result<T, E> {
        self(context)
    }
}
