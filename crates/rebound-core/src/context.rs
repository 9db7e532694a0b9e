//! Per-execution retry state.
//!
//! A [`RetryContext`] is created by the engine at the start of every
//! `execute` call and dropped when that call returns. It records the attempt
//! count, the last failure and an attribute bag that policies and listeners
//! use to carry state between attempts.

use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;

/// A failure recorded by the engine, shared between the context and observers.
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// Attribute set to `true` once the retry policy declares exhaustion.
pub const EXHAUSTED: &str = "context.exhausted";

/// Attribute set to `true` when the recovery callback is invoked.
pub const RECOVERED: &str = "context.recovered";

/// Attribute holding the cumulative back-off pause in milliseconds.
pub const BACKOFF_TOTAL_MS: &str = "backoff.total_ms";

tokio::task_local! {
    static ACTIVE: RetryContext;
}

/// Mutable state of a single retry execution.
///
/// The context is a cheap handle: clones observe the same state. It is owned
/// by exactly one logical `execute` call and must not be shared with other
/// tasks. The operation receives a clone so it can read the attempt number or
/// stash attributes across await points.
///
/// # Examples
///
/// ```rust
/// use rebound_core::prelude::*;
///
/// # async fn example() -> Result<(), RetryError<std::io::Error>> {
/// let template = RetryTemplate::default();
///
/// let attempts = template
///     .execute(|ctx: RetryContext| async move {
///         ctx.set_attribute("seen", true);
///         Ok::<_, std::io::Error>(ctx.attempt_count())
///     })
///     .await?;
///
/// assert_eq!(attempts, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RetryContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    name: Option<String>,
    parent: Option<Weak<ContextInner>>,
    started_at: Instant,
    state: Mutex<ContextState>,
}

#[derive(Default)]
struct ContextState {
    attempt_count: u32,
    last_failure: Option<SharedError>,
    attributes: HashMap<String, Value>,
    exhausted_only: bool,
}

impl RetryContext {
    /// Create a fresh context, linked to `parent` without owning it.
    pub fn new(name: Option<String>, parent: Option<&RetryContext>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name,
                parent: parent.map(|p| Arc::downgrade(&p.inner)),
                started_at: Instant::now(),
                state: Mutex::new(ContextState::default()),
            }),
        }
    }

    /// The context of the attempt currently running on this task, if any.
    ///
    /// The engine publishes its context while the operation runs, so a
    /// retried operation that itself retries can find its enclosing scope.
    pub fn current() -> Option<RetryContext> {
        ACTIVE.try_with(Clone::clone).ok()
    }

    /// Label of this execution, taken from the template that created it.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Number of attempts started so far (the running attempt included).
    pub fn attempt_count(&self) -> u32 {
        self.state().attempt_count
    }

    /// The most recent failure, absent until an attempt has failed.
    pub fn last_failure(&self) -> Option<SharedError> {
        self.state().last_failure.clone()
    }

    /// Store an attribute, replacing any previous value under `key`.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.state().attributes.insert(key.into(), value.into());
    }

    /// Look up an attribute. Unknown keys yield `None`.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.state().attributes.get(key).cloned()
    }

    /// Whether an attribute is present under `key`.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.state().attributes.contains_key(key)
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&self, key: &str) -> Option<Value> {
        self.state().attributes.remove(key)
    }

    /// The enclosing context of a nested execution.
    ///
    /// Returns `None` for top-level executions, or when the parent has
    /// already finished.
    pub fn parent(&self) -> Option<RetryContext> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| RetryContext { inner })
    }

    /// Ask the engine to stop retrying once the current attempt fails.
    pub fn set_exhausted_only(&self) {
        self.state().exhausted_only = true;
    }

    /// Whether no further attempts are permitted.
    pub fn is_exhausted_only(&self) -> bool {
        self.state().exhausted_only
    }

    /// Time since the execution started.
    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    pub(crate) fn begin_attempt(&self) -> u32 {
        let mut state = self.state();
        state.attempt_count += 1;
        state.attempt_count
    }

    pub(crate) fn register_failure(&self, failure: SharedError) {
        self.state().last_failure = Some(failure);
    }

    /// Run `future` with this context published as the task's active one.
    pub(crate) fn scope<F: Future>(&self, future: F) -> impl Future<Output = F::Output> {
        ACTIVE.scope(self.clone(), future)
    }

    fn state(&self) -> MutexGuard<'_, ContextState> {
        // No lock is held across user code, so a poisoned guard is still consistent.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RetryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("RetryContext")
            .field("name", &self.inner.name)
            .field("attempt_count", &state.attempt_count)
            .field(
                "last_failure",
                &state.last_failure.as_ref().map(ToString::to_string),
            )
            .field("attributes", &state.attributes)
            .field("exhausted_only", &state.exhausted_only)
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
