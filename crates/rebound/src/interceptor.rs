//! Call-site adapter that retries intercepted invocations.
//!
//! An [`Invocation`] stands for one intercepted call: it exposes the call's
//! arguments and can run the underlying call again via
//! [`proceed`](Invocation::proceed). [`RetryInterceptor`] turns that into a
//! retryable operation, snapshots the arguments once before the first attempt
//! and, when retries are exhausted, hands the snapshot and the last failure
//! to a [`MethodInvocationRecoverer`].

use async_trait::async_trait;
use rebound_core::context::{RetryContext, SharedError};
use rebound_core::error::RetryError;
use rebound_core::recovery::RecoveryCallback;
use rebound_core::template::{RetryOperations, RetryTemplate};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One intercepted call that can be replayed.
///
/// How replay works is up to the implementor; each call to
/// [`proceed`](Self::proceed) must run the whole underlying call again.
#[async_trait]
pub trait Invocation: Send + Sync {
    /// Arguments of the call.
    type Args: Clone + Send + Sync + 'static;
    /// Value produced by a successful call.
    type Output: Send;
    /// Failure produced by the call.
    type Error: Error + Send + Sync + 'static;

    /// Arguments the call was made with.
    fn arguments(&self) -> &Self::Args;

    /// Run the underlying call once.
    async fn proceed(&self) -> Result<Self::Output, Self::Error>;
}

/// Produces a fallback from the original call's arguments.
///
/// Closures taking `(&A, Option<SharedError>)` implement this trait.
pub trait MethodInvocationRecoverer<A, T, E>: Send + Sync {
    /// Compute the fallback from the argument snapshot and the last failure.
    fn recover(&self, args: &A, cause: Option<SharedError>) -> Result<T, E>;
}

impl<A, T, E, F> MethodInvocationRecoverer<A, T, E> for F
where
    F: Fn(&A, Option<SharedError>) -> Result<T, E> + Send + Sync,
{
    fn recover(&self, args: &A, cause: Option<SharedError>) -> Result<T, E> {
        self(args, cause)
    }
}

/// Recovery callback bound to a frozen argument snapshot.
struct SnapshotRecovery<'a, A, T, E> {
    recoverer: &'a dyn MethodInvocationRecoverer<A, T, E>,
    args: A,
}

impl<A, T, E> RecoveryCallback<T, E> for SnapshotRecovery<'_, A, T, E>
where
    A: Send + Sync,
{
    fn recover(&self, context: &RetryContext) -> Result<T, E> {
        self.recoverer.recover(&self.args, context.last_failure())
    }
}

/// Retries intercepted invocations through a [`RetryOperations`] engine.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use rebound::interceptor::{Invocation, RetryInterceptor};
/// use rebound::prelude::*;
///
/// struct Lookup {
///     user_id: u64,
/// }
///
/// #[async_trait]
/// impl Invocation for Lookup {
///     type Args = u64;
///     type Output = String;
///     type Error = std::io::Error;
///
///     fn arguments(&self) -> &u64 {
///         &self.user_id
///     }
///
///     async fn proceed(&self) -> Result<String, std::io::Error> {
///         Err(std::io::Error::other("directory offline"))
///     }
/// }
///
/// # async fn example() {
/// let mut interceptor = RetryInterceptor::new(RetryTemplate::default());
/// interceptor.set_recoverer(|id: &u64, _cause: Option<SharedError>| {
///     Ok(format!("guest-{}", id))
/// });
///
/// let name = interceptor.invoke(&Lookup { user_id: 7 }).await.unwrap();
/// assert_eq!(name, "guest-7");
/// # }
/// ```
pub struct RetryInterceptor<A, T, E, O = RetryTemplate> {
    operations: Arc<O>,
    recoverer: Option<Arc<dyn MethodInvocationRecoverer<A, T, E>>>,
}

impl<A, T, E, O: Default> Default for RetryInterceptor<A, T, E, O> {
    fn default() -> Self {
        Self::new(O::default())
    }
}

impl<A, T, E, O> Clone for RetryInterceptor<A, T, E, O> {
    fn clone(&self) -> Self {
        Self {
            operations: Arc::clone(&self.operations),
            recoverer: self.recoverer.clone(),
        }
    }
}

impl<A, T, E, O: fmt::Debug> fmt::Debug for RetryInterceptor<A, T, E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryInterceptor")
            .field("operations", &self.operations)
            .field("has_recoverer", &self.recoverer.is_some())
            .finish()
    }
}

impl<A, T, E, O> RetryInterceptor<A, T, E, O> {
    /// Create an interceptor running invocations through `operations`.
    pub fn new(operations: O) -> Self {
        Self {
            operations: Arc::new(operations),
            recoverer: None,
        }
    }

    /// Replace the retry engine.
    pub fn set_retry_operations(&mut self, operations: O) {
        self.operations = Arc::new(operations);
    }

    /// Set the fallback used once retries are exhausted.
    pub fn set_recoverer(&mut self, recoverer: impl MethodInvocationRecoverer<A, T, E> + 'static) {
        self.recoverer = Some(Arc::new(recoverer));
    }

    /// The retry engine in use.
    pub fn retry_operations(&self) -> &O {
        &self.operations
    }
}

impl<A, T, E, O> RetryInterceptor<A, T, E, O>
where
    A: Clone + Send + Sync + 'static,
    T: Send,
    E: Error + Send + Sync + 'static,
    O: RetryOperations,
{
    /// Run `invocation` under the retry engine.
    ///
    /// The arguments are cloned once, before the first attempt; the
    /// recoverer sees that snapshot even if the call mutated its own copy.
    pub async fn invoke<I>(&self, invocation: &I) -> Result<T, RetryError<E>>
    where
        I: Invocation<Args = A, Output = T, Error = E>,
    {
        let operation = |_ctx: RetryContext| invocation.proceed();

        match &self.recoverer {
            Some(recoverer) => {
                let recovery = SnapshotRecovery {
                    recoverer: recoverer.as_ref(),
                    args: invocation.arguments().clone(),
                };
                debug!("Invoking with recovery");
                self.operations
                    .execute_with_recovery(operation, recovery)
                    .await
            }
            None => self.operations.execute(operation).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        args: Vec<String>,
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Invocation for Flaky {
        type Args = Vec<String>;
        type Output = u32;
        type Error = io::Error;

        fn arguments(&self) -> &Vec<String> {
            &self.args
        }

        async fn proceed(&self) -> Result<u32, io::Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(io::Error::other(format!("call {}", call)))
            } else {
                Ok(call)
            }
        }
    }

    fn flaky(failures: u32) -> Flaky {
        Flaky {
            args: vec!["a".to_string(), "b".to_string()],
            failures,
            calls: AtomicU32::new(0),
        }
    }

    #[tokio::test]
    async fn test_invoke_retries_until_success() {
        let interceptor: RetryInterceptor<_, _, _> = RetryInterceptor::default();
        let invocation = flaky(2);

        let result = interceptor.invoke(&invocation).await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(invocation.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invoke_without_recoverer_returns_last_error() {
        let interceptor: RetryInterceptor<_, _, _> = RetryInterceptor::default();

        let result = interceptor.invoke(&flaky(10)).await;

        match result {
            Err(RetryError::Exhausted(err)) => assert_eq!(err.to_string(), "call 3"),
            other => panic!("Expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recoverer_receives_snapshot_and_cause() {
        let seen = Arc::new(Mutex::new(None));
        let mut interceptor = RetryInterceptor::new(RetryTemplate::builder().max_attempts(2).build());
        let sink = Arc::clone(&seen);
        interceptor.set_recoverer(move |args: &Vec<String>, cause: Option<SharedError>| {
            *sink.lock().unwrap() = Some((args.clone(), cause.map(|c| c.to_string())));
            Ok(0)
        });

        let result = interceptor.invoke(&flaky(10)).await;

        assert_eq!(result.unwrap(), 0);
        assert_eq!(
            seen.lock().unwrap().take(),
            Some((
                vec!["a".to_string(), "b".to_string()],
                Some("call 2".to_string())
            ))
        );
    }

    #[tokio::test]
    async fn test_set_retry_operations_replaces_engine() {
        let mut interceptor: RetryInterceptor<_, _, _> = RetryInterceptor::default();
        interceptor.set_retry_operations(RetryTemplate::builder().max_attempts(5).build());
        let invocation = flaky(4);

        assert_eq!(interceptor.invoke(&invocation).await.unwrap(), 5);
    }
}
