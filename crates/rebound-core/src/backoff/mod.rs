//! Back-off policies: how long to pause between attempts.
//!
//! # Key Types
//!
//! - [`BackOffPolicy`] - Core trait for pause decisions
//! - [`NoBackOffPolicy`] - Retry immediately (the default)
//! - [`FixedBackOffPolicy`] - Constant pause
//! - [`ExponentialBackOffPolicy`] - Exponential growth with jitter
//! - [`UniformRandomBackOffPolicy`] - Random pause within bounds
//!
//! # Examples
//!
//! ```rust
//! use rebound_core::prelude::*;
//! use std::time::Duration;
//!
//! let template = RetryTemplate::builder()
//!     .retry_policy(SimpleRetryPolicy::new(4))
//!     .back_off_policy(
//!         ExponentialBackOffPolicy::builder()
//!             .initial_delay(Duration::from_millis(50))
//!             .build(),
//!     )
//!     .build();
//! ```

mod exponential;
mod policy;
mod uniform;

pub use exponential::{ExponentialBackOffPolicy, ExponentialBackOffPolicyBuilder};
pub use policy::{BackOffPolicy, FixedBackOffPolicy, NoBackOffPolicy};
pub use uniform::UniformRandomBackOffPolicy;
