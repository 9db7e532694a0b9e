//! Errors surfaced by the retry engine.

use std::sync::Arc;

/// Outcome of an `execute` call that did not produce a value.
///
/// The engine never swallows a failure: every exhausted, vetoed or cancelled
/// execution ends up here. Without a recovery callback, the caller sees the
/// final attempt's error unchanged in [`RetryError::Exhausted`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Retries were exhausted; holds the error from the last attempt.
    ///
    /// The error is shared with the execution's context, where listeners
    /// and recovery see it as [`last_failure`](crate::context::RetryContext::last_failure).
    #[error(transparent)]
    Exhausted(Arc<E>),

    /// A listener declined to open the execution. The operation never ran.
    #[error("retry vetoed by listener")]
    Vetoed,

    /// The cancellation token fired before an attempt or during a pause.
    #[error("retry cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Attempts started before cancellation was observed.
        attempts: u32,
    },

    /// The recovery callback itself failed. Recovery is never retried.
    #[error("recovery failed: {0}")]
    Recovery(#[source] E),
}

impl<E> RetryError<E> {
    /// The operation or recovery error, when there is one.
    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::Exhausted(err) => Some(err),
            Self::Recovery(err) => Some(err),
            _ => None,
        }
    }

    /// Whether a listener vetoed the execution.
    pub fn is_vetoed(&self) -> bool {
        matches!(self, Self::Vetoed)
    }

    /// Whether the execution was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether retries ran out and the last attempt's error is returned.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
}
