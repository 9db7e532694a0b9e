//! Observers of the retry lifecycle.
//!
//! For every `execute` call the engine runs `open` on each listener in
//! registration order, `on_error` after each failed attempt and `close` once
//! at the end, both in reverse registration order so that listeners nest like
//! acquire/release pairs:
//!
//! ```text
//! L1.open, L2.open, [L2.on_error, L1.on_error]*, L2.close, L1.close
//! ```

use crate::context::RetryContext;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Hooks invoked around a retry execution.
///
/// Every method has a default, so implementors override only what they
/// need. The operation being retried is identified by
/// [`RetryContext::name`].
///
/// # Examples
///
/// ```rust
/// use rebound_core::context::RetryContext;
/// use rebound_core::listener::RetryListener;
///
/// /// Refuses to start while maintenance is on.
/// struct MaintenanceGate {
///     maintenance: bool,
/// }
///
/// impl RetryListener for MaintenanceGate {
///     fn open(&self, _context: &RetryContext) -> bool {
///         !self.maintenance
///     }
/// }
/// ```
pub trait RetryListener: Send + Sync {
    /// Called before the first attempt. Returning `false` vetoes the
    /// execution: the operation never runs.
    fn open(&self, context: &RetryContext) -> bool {
        let _ = context;
        true
    }

    /// Called after every failed attempt, before the retry policy decides.
    fn on_error(&self, context: &RetryContext, error: &(dyn Error + Send + Sync + 'static)) {
        let _ = (context, error);
    }

    /// Called exactly once when the execution ends, with the terminal
    /// failure or `None` on success.
    fn close(&self, context: &RetryContext, error: Option<&(dyn Error + Send + Sync + 'static)>) {
        let _ = (context, error);
    }
}

impl<L: RetryListener + ?Sized> RetryListener for Arc<L> {
    fn open(&self, context: &RetryContext) -> bool {
        (**self).open(context)
    }

    fn on_error(&self, context: &RetryContext, error: &(dyn Error + Send + Sync + 'static)) {
        (**self).on_error(context, error)
    }

    fn close(&self, context: &RetryContext, error: Option<&(dyn Error + Send + Sync + 'static)>) {
        (**self).close(context, error)
    }
}

/// A listener that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl RetryListener for NoopListener {}

/// Shared no-op listener instance.
pub static NOOP_LISTENER: NoopListener = NoopListener;

/// Emits `tracing` events for every lifecycle hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl RetryListener for TracingListener {
    fn open(&self, context: &RetryContext) -> bool {
        debug!(name = context.name().unwrap_or("-"), "Retry execution opened");
        true
    }

    fn on_error(&self, context: &RetryContext, error: &(dyn Error + Send + Sync + 'static)) {
        warn!(
            name = context.name().unwrap_or("-"),
            attempt = context.attempt_count(),
            error = %error,
            "Retry attempt failed"
        );
    }

    fn close(&self, context: &RetryContext, error: Option<&(dyn Error + Send + Sync + 'static)>) {
        match error {
            None if context.attempt_count() == 0 => warn!(
                name = context.name().unwrap_or("-"),
                "Retry execution closed before any attempt"
            ),
            None => info!(
                name = context.name().unwrap_or("-"),
                attempts = context.attempt_count(),
                "Retry execution succeeded"
            ),
            Some(error) => warn!(
                name = context.name().unwrap_or("-"),
                attempts = context.attempt_count(),
                error = %error,
                "Retry execution closed with failure"
            ),
        }
    }
}

/// Counters for executions sharing a name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryStatistics {
    /// Executions opened.
    pub started: u64,
    /// Executions that closed without a failure after at least one attempt.
    pub completed: u64,
    /// Failed attempts across all executions.
    pub errors: u64,
    /// Executions that closed with a failure or before any attempt ran.
    pub aborted: u64,
}

/// Aggregates [`RetryStatistics`] per execution name.
///
/// Unnamed executions are counted under `"unnamed"`.
#[derive(Debug, Default)]
pub struct StatisticsListener {
    stats: Mutex<HashMap<String, RetryStatistics>>,
}

impl StatisticsListener {
    const UNNAMED: &'static str = "unnamed";

    /// Create a listener with empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for `name`, if any execution with that name was seen.
    pub fn statistics(&self, name: &str) -> Option<RetryStatistics> {
        self.stats().get(name).copied()
    }

    /// Copy of all counters, keyed by execution name.
    pub fn snapshot(&self) -> HashMap<String, RetryStatistics> {
        self.stats().clone()
    }

    fn update(&self, context: &RetryContext, apply: impl FnOnce(&mut RetryStatistics)) {
        let name = context.name().unwrap_or(Self::UNNAMED).to_string();
        apply(self.stats().entry(name).or_default());
    }

    fn stats(&self) -> MutexGuard<'_, HashMap<String, RetryStatistics>> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RetryListener for StatisticsListener {
    fn open(&self, context: &RetryContext) -> bool {
        self.update(context, |s| s.started += 1);
        true
    }

    fn on_error(&self, context: &RetryContext, _error: &(dyn Error + Send + Sync + 'static)) {
        self.update(context, |s| s.errors += 1);
    }

    fn close(&self, context: &RetryContext, error: Option<&(dyn Error + Send + Sync + 'static)>) {
        if error.is_none() && context.attempt_count() > 0 {
            self.update(context, |s| s.completed += 1);
        } else {
            self.update(context, |s| s.aborted += 1);
        }
    }
}
