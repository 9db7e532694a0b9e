#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core of the rebound retry engine.
//!
//! This crate runs a fallible async operation repeatedly under the control of
//! a retry policy, tracks per-execution state, notifies observers and falls
//! back to a recovery callback once retries are exhausted:
//!
//! - **Per-execution state** via [`RetryContext`](context::RetryContext)
//!   - Attempt count, last failure, attribute bag
//!   - Parent link for nested executions
//! - **Retry decisions** via the [`RetryPolicy`](policy::RetryPolicy) trait
//! - **Pauses between attempts** via the [`BackOffPolicy`](backoff::BackOffPolicy) trait
//! - **Lifecycle observers** via the [`RetryListener`](listener::RetryListener) trait
//! - **Fallbacks** via the [`RecoveryCallback`](recovery::RecoveryCallback) trait
//! - **The engine** itself: [`RetryTemplate`](template::RetryTemplate)
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use rebound_core::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let template = RetryTemplate::builder()
//!     .max_attempts(3)
//!     .back_off_policy(FixedBackOffPolicy::new(Duration::from_millis(100)))
//!     .build();
//!
//! let result = template.execute(|_ctx| async {
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod context;
pub mod error;
pub mod listener;
pub mod policy;
pub mod recovery;
pub mod template;

pub use tokio_util::sync::CancellationToken;

/// Convenient re-exports of commonly used items.
///
/// Import all core abstractions with:
///
/// ```rust
/// use rebound_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::CancellationToken;
    pub use crate::backoff::{
        BackOffPolicy, ExponentialBackOffPolicy, FixedBackOffPolicy, NoBackOffPolicy,
        UniformRandomBackOffPolicy,
    };
    pub use crate::context::{RetryContext, SharedError};
    pub use crate::error::RetryError;
    pub use crate::listener::{
        NOOP_LISTENER, NoopListener, RetryListener, RetryStatistics, StatisticsListener,
        TracingListener,
    };
    pub use crate::policy::{
        AlwaysRetryPolicy, CompositeRetryPolicy, NeverRetryPolicy, RetryPolicy,
        SimpleRetryPolicy, TimeoutRetryPolicy,
    };
    pub use crate::recovery::RecoveryCallback;
    pub use crate::template::{RetryOperations, RetryTemplate, RetryTemplateBuilder};
}
