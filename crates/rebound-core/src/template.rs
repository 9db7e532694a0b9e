//! The retry engine.
//!
//! [`RetryTemplate`] drives the execute loop: it creates a fresh
//! [`RetryContext`], opens the listeners, invokes the operation until it
//! succeeds or the [`RetryPolicy`] gives up, pauses between attempts as the
//! [`BackOffPolicy`] prescribes, closes the listeners and finally falls back
//! to a [`RecoveryCallback`] if one was supplied.

use crate::backoff::{BackOffPolicy, NoBackOffPolicy};
use crate::context::{BACKOFF_TOTAL_MS, EXHAUSTED, RECOVERED, RetryContext};
use crate::error::RetryError;
use crate::listener::RetryListener;
use crate::policy::{RetryPolicy, SimpleRetryPolicy};
use crate::recovery::RecoveryCallback;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The entry point callers use to run an operation under a retry policy.
///
/// [`RetryTemplate`] is the provided implementation; the trait exists so
/// call-site adapters can be written against any engine.
///
/// # Examples
///
/// ```rust
/// use rebound_core::prelude::*;
///
/// async fn fetch_with<O: RetryOperations>(ops: &O) -> Result<u32, RetryError<std::io::Error>> {
///     ops.execute(|_ctx| async { Ok::<_, std::io::Error>(7) }).await
/// }
/// ```
#[async_trait]
pub trait RetryOperations: Send + Sync {
    /// Run `operation` until it succeeds or retries are exhausted.
    ///
    /// On exhaustion the last attempt's error is returned in
    /// [`RetryError::Exhausted`].
    async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static;

    /// Run `operation`, falling back to `recovery` once retries are exhausted.
    async fn execute_with_recovery<F, Fut, T, E, R>(
        &self,
        operation: F,
        recovery: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static,
        R: RecoveryCallback<T, E>;
}

/// Retry engine combining a retry policy, a back-off policy and listeners.
///
/// Defaults: at most 3 attempts ([`SimpleRetryPolicy`]), no pause between
/// attempts ([`NoBackOffPolicy`]), no listeners. The template holds no
/// per-execution state and can be shared between concurrent executions.
///
/// # Examples
///
/// ```rust
/// use rebound_core::prelude::*;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), RetryError<std::io::Error>> {
/// let template = RetryTemplate::builder()
///     .name("fetch-user")
///     .max_attempts(5)
///     .back_off_policy(FixedBackOffPolicy::new(Duration::from_millis(10)))
///     .build();
///
/// let calls = Arc::new(AtomicU32::new(0));
/// let value = template
///     .execute(|_ctx| {
///         let calls = Arc::clone(&calls);
///         async move {
///             if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///                 Err(std::io::Error::other("transient"))
///             } else {
///                 Ok("user")
///             }
///         }
///     })
///     .await?;
///
/// assert_eq!(value, "user");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RetryTemplate {
    name: Option<String>,
    retry_policy: Arc<dyn RetryPolicy>,
    back_off_policy: Arc<dyn BackOffPolicy>,
    listeners: Vec<Arc<dyn RetryListener>>,
}

impl Default for RetryTemplate {
    fn default() -> Self {
        Self {
            name: None,
            retry_policy: Arc::new(SimpleRetryPolicy::default()),
            back_off_policy: Arc::new(NoBackOffPolicy),
            listeners: Vec::new(),
        }
    }
}

impl fmt::Debug for RetryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTemplate")
            .field("name", &self.name)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl RetryTemplate {
    /// Create a new builder for configuring a template.
    pub fn builder() -> RetryTemplateBuilder {
        RetryTemplateBuilder::default()
    }

    /// Label given to every context this template creates.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Replace the label given to contexts.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Replace the retry policy.
    pub fn set_retry_policy(&mut self, policy: impl RetryPolicy + 'static) {
        self.retry_policy = Arc::new(policy);
    }

    /// Replace the back-off policy.
    pub fn set_back_off_policy(&mut self, policy: impl BackOffPolicy + 'static) {
        self.back_off_policy = Arc::new(policy);
    }

    /// Replace all listeners. Order is registration order.
    pub fn set_listeners(&mut self, listeners: Vec<Arc<dyn RetryListener>>) {
        self.listeners = listeners;
    }

    /// Append a listener after the already registered ones.
    pub fn register_listener(&mut self, listener: impl RetryListener + 'static) {
        self.listeners.push(Arc::new(listener));
    }

    /// Registered listeners, in registration order.
    pub fn listeners(&self) -> &[Arc<dyn RetryListener>] {
        &self.listeners
    }

    /// Run `operation` until it succeeds or retries are exhausted.
    ///
    /// The operation receives a handle to the execution's context. Without
    /// recovery, exhaustion returns the last attempt's error unchanged in
    /// [`RetryError::Exhausted`].
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static,
    {
        self.run(operation, None, None).await
    }

    /// Run `operation`, returning `recovery`'s result once retries are
    /// exhausted.
    pub async fn execute_with_recovery<F, Fut, T, E, R>(
        &self,
        operation: F,
        recovery: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static,
        R: RecoveryCallback<T, E>,
    {
        self.run(operation, Some(&recovery), None).await
    }

    /// Like [`execute_with_recovery`](Self::execute_with_recovery), but
    /// stops with [`RetryError::Cancelled`] when `token` fires.
    ///
    /// The token is checked before every attempt and raced against every
    /// back-off pause. A running attempt is not interrupted. Recovery is not
    /// invoked for a cancelled execution.
    pub async fn execute_cancellable<F, Fut, T, E>(
        &self,
        operation: F,
        recovery: Option<&dyn RecoveryCallback<T, E>>,
        token: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static,
    {
        self.run(operation, recovery, Some(token)).await
    }

    async fn run<F, Fut, T, E>(
        &self,
        mut operation: F,
        recovery: Option<&dyn RecoveryCallback<T, E>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static,
    {
        let context = RetryContext::new(self.name.clone(), RetryContext::current().as_ref());
        let label = self.name.as_deref().unwrap_or("-");

        let opened = self.open_listeners(&context);
        if opened < self.listeners.len() {
            warn!(name = label, listener = opened, "Retry vetoed by listener");
            self.close_listeners(&context, opened, None);
            return Err(RetryError::Vetoed);
        }

        let mut previous: Option<Arc<E>> = None;
        let last_error = loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                let failure = previous.as_deref().map(|e| e as &(dyn Error + Send + Sync + 'static));
                return Err(self.cancelled(&context, failure));
            }

            let attempt = context.begin_attempt();
            debug!(name = label, attempt, "Starting attempt");

            let err = match context.scope(operation(context.clone())).await {
                Ok(value) => {
                    debug!(name = label, attempt, "Attempt succeeded");
                    self.close_listeners(&context, self.listeners.len(), None);
                    return Ok(value);
                }
                Err(err) => Arc::new(err),
            };

            warn!(name = label, attempt, error = %err, "Attempt failed");
            context.register_failure(err.clone());
            for listener in self.listeners.iter().rev() {
                listener.on_error(&context, &*err);
            }

            if context.is_exhausted_only() || !self.retry_policy.can_retry(&context) {
                break err;
            }

            if let Some(delay) = self.back_off_policy.next_delay(&context)
                && !delay.is_zero()
            {
                record_back_off(&context, delay);
                debug!(name = label, attempt, delay_ms = %delay.as_millis(), "Backing off");

                let interrupted = match cancel {
                    Some(token) => tokio::select! {
                        _ = token.cancelled() => true,
                        _ = tokio::time::sleep(delay) => false,
                    },
                    None => {
                        tokio::time::sleep(delay).await;
                        false
                    }
                };
                if interrupted {
                    return Err(self.cancelled(&context, Some(&*err)));
                }
            }

            previous = Some(err);
        };

        context.set_exhausted_only();
        context.set_attribute(EXHAUSTED, true);
        info!(name = label, attempts = context.attempt_count(), "Retries exhausted");
        self.close_listeners(&context, self.listeners.len(), Some(&*last_error));

        if let Some(recovery) = recovery {
            context.set_attribute(RECOVERED, true);
            debug!(name = label, "Invoking recovery callback");
            return recovery.recover(&context).map_err(RetryError::Recovery);
        }

        Err(RetryError::Exhausted(last_error))
    }

    /// Open listeners in registration order, stopping at the first veto.
    fn open_listeners(&self, context: &RetryContext) -> usize {
        self.listeners
            .iter()
            .take_while(|listener| listener.open(context))
            .count()
    }

    /// Close the first `opened` listeners in reverse registration order.
    fn close_listeners(
        &self,
        context: &RetryContext,
        opened: usize,
        error: Option<&(dyn Error + Send + Sync + 'static)>,
    ) {
        for listener in self.listeners[..opened].iter().rev() {
            listener.close(context, error);
        }
    }

    fn cancelled<E>(
        &self,
        context: &RetryContext,
        error: Option<&(dyn Error + Send + Sync + 'static)>,
    ) -> RetryError<E> {
        let attempts = context.attempt_count();
        warn!(name = self.name.as_deref().unwrap_or("-"), attempts, "Retry cancelled");
        self.close_listeners(context, self.listeners.len(), error);
        RetryError::Cancelled { attempts }
    }
}

fn record_back_off(context: &RetryContext, delay: Duration) {
    let total = context
        .attribute(BACKOFF_TOTAL_MS)
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    context.set_attribute(BACKOFF_TOTAL_MS, total.saturating_add(millis));
}

#[async_trait]
impl RetryOperations for RetryTemplate {
    async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static,
    {
        self.run(operation, None, None).await
    }

    async fn execute_with_recovery<F, Fut, T, E, R>(
        &self,
        operation: F,
        recovery: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryContext) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static,
        R: RecoveryCallback<T, E>,
    {
        self.run(operation, Some(&recovery), None).await
    }
}

/// Builder for configuring [`RetryTemplate`].
///
/// # Examples
///
/// ```rust
/// use rebound_core::prelude::*;
/// use std::time::Duration;
///
/// let template = RetryTemplate::builder()
///     .name("payments")
///     .retry_policy(TimeoutRetryPolicy::new(Duration::from_secs(5)))
///     .back_off_policy(UniformRandomBackOffPolicy::default())
///     .listener(TracingListener)
///     .build();
///
/// assert_eq!(template.name(), Some("payments"));
/// assert_eq!(template.listeners().len(), 1);
/// ```
#[derive(Default)]
pub struct RetryTemplateBuilder {
    template: RetryTemplate,
}

impl RetryTemplateBuilder {
    /// Label for contexts created by the template.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.template.set_name(name);
        self
    }

    /// Set the retry policy.
    ///
    /// Default: [`SimpleRetryPolicy`] with 3 attempts
    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.template.set_retry_policy(policy);
        self
    }

    /// Shorthand for a [`SimpleRetryPolicy`] with `max_attempts`.
    pub fn max_attempts(self, max_attempts: u32) -> Self {
        self.retry_policy(SimpleRetryPolicy::new(max_attempts))
    }

    /// Set the back-off policy.
    ///
    /// Default: [`NoBackOffPolicy`]
    pub fn back_off_policy(mut self, policy: impl BackOffPolicy + 'static) -> Self {
        self.template.set_back_off_policy(policy);
        self
    }

    /// Register a listener after the ones already added.
    pub fn listener(mut self, listener: impl RetryListener + 'static) -> Self {
        self.template.register_listener(listener);
        self
    }

    /// Build the template.
    pub fn build(self) -> RetryTemplate {
        self.template
    }
}
