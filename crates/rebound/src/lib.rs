#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Rebound
//!
//! Declarative retry for async Rust.
//!
//! This crate builds on [`rebound_core`] and adds:
//!
//! - **Configuration**: [`RetryConfig`](config::RetryConfig) loaded from TOML or
//!   `REBOUND_*` environment variables and turned into a ready
//!   [`RetryTemplate`](rebound_core::template::RetryTemplate)
//! - **Call-site interception**: [`RetryInterceptor`](interceptor::RetryInterceptor)
//!   retries a replayable [`Invocation`](interceptor::Invocation) and recovers
//!   from the original call's arguments
//!
//! ## Quick Start
//!
//! ```rust
//! use rebound::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let template = RetryConfig::from_toml_str("max_attempts = 4")?.build_template()?;
//!
//! let value = template
//!     .execute(|ctx| async move {
//!         if ctx.attempt_count() < 2 {
//!             Err(std::io::Error::other("transient"))
//!         } else {
//!             Ok(ctx.attempt_count())
//!         }
//!     })
//!     .await?;
//!
//! assert_eq!(value, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `env` (default): [`RetryConfig::from_env`](config::RetryConfig::from_env)

pub mod config;
pub mod error;
pub mod interceptor;

pub use rebound_core;

/// Convenient re-exports of commonly used items.
pub mod prelude {
    pub use crate::config::{BackOffConfig, RetryConfig};
    pub use crate::error::ConfigError;
    pub use crate::interceptor::{Invocation, MethodInvocationRecoverer, RetryInterceptor};
    pub use rebound_core::prelude::*;
}
