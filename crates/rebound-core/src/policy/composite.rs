use super::RetryPolicy;
use crate::context::RetryContext;
use std::sync::Arc;

/// Combines several policies into one decision.
///
/// Pessimistic (the default) allows a retry only if every policy does;
/// optimistic allows it if any policy does. An empty pessimistic composite
/// always retries, an empty optimistic one never does.
///
/// # Examples
///
/// ```rust
/// use rebound_core::policy::{CompositeRetryPolicy, SimpleRetryPolicy, TimeoutRetryPolicy};
/// use std::time::Duration;
///
/// // Up to 5 attempts, but never beyond 2 seconds.
/// let policy = CompositeRetryPolicy::pessimistic()
///     .with(SimpleRetryPolicy::new(5))
///     .with(TimeoutRetryPolicy::new(Duration::from_secs(2)));
/// ```
#[derive(Clone, Default)]
pub struct CompositeRetryPolicy {
    policies: Vec<Arc<dyn RetryPolicy>>,
    optimistic: bool,
}

impl CompositeRetryPolicy {
    /// All member policies must allow the retry.
    pub fn pessimistic() -> Self {
        Self::default()
    }

    /// Any member policy may allow the retry.
    pub fn optimistic() -> Self {
        Self {
            policies: Vec::new(),
            optimistic: true,
        }
    }

    /// Add a member policy.
    pub fn with(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Number of member policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether there are no member policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl std::fmt::Debug for CompositeRetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeRetryPolicy")
            .field("policies", &self.policies.len())
            .field("optimistic", &self.optimistic)
            .finish()
    }
}

impl RetryPolicy for CompositeRetryPolicy {
    fn can_retry(&self, context: &RetryContext) -> bool {
        if self.optimistic {
            self.policies.iter().any(|p| p.can_retry(context))
        } else {
            self.policies.iter().all(|p| p.can_retry(context))
        }
    }
}
