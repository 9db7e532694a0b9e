//! Declarative configuration for retry templates

use crate::error::{ConfigError, Result};
use rebound_core::backoff::{
    BackOffPolicy, ExponentialBackOffPolicy, FixedBackOffPolicy, NoBackOffPolicy,
    UniformRandomBackOffPolicy,
};
use rebound_core::policy::{CompositeRetryPolicy, SimpleRetryPolicy, TimeoutRetryPolicy};
use rebound_core::template::RetryTemplate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for building a [`RetryTemplate`].
///
/// Missing fields take the engine defaults: 3 attempts, no timeout and no
/// pause between attempts.
///
/// # Examples
///
/// ```rust
/// use rebound::config::{BackOffConfig, RetryConfig};
///
/// let config = RetryConfig::from_toml_str(
///     r#"
///     name = "orders"
///     max_attempts = 5
///     timeout_ms = 2000
///
///     [backoff]
///     type = "exponential"
///     initial_ms = 50
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.max_attempts, 5);
/// assert!(matches!(config.backoff, BackOffConfig::Exponential { .. }));
///
/// let template = config.build_template().unwrap();
/// assert_eq!(template.name(), Some("orders"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Label for contexts created by the template
    pub name: Option<String>,

    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Overall time budget in milliseconds, checked before each retry
    pub timeout_ms: Option<u64>,

    /// Pause between attempts
    pub backoff: BackOffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            name: None,
            max_attempts: SimpleRetryPolicy::DEFAULT_MAX_ATTEMPTS,
            timeout_ms: None,
            backoff: BackOffConfig::None,
        }
    }
}

/// Back-off settings, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackOffConfig {
    /// Retry immediately.
    #[default]
    None,

    /// Constant pause.
    Fixed {
        /// Pause in milliseconds
        #[serde(default = "default_period_ms")]
        period_ms: u64,
    },

    /// Exponentially growing pause with jitter.
    Exponential {
        /// First pause in milliseconds
        #[serde(default = "default_initial_ms")]
        initial_ms: u64,
        /// Upper bound in milliseconds
        #[serde(default = "default_max_ms")]
        max_ms: u64,
        /// Growth factor per retry
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        /// Random variation as a fraction of the delay (0.0 - 1.0)
        #[serde(default = "default_jitter")]
        jitter: f64,
    },

    /// Uniformly random pause within bounds.
    Uniform {
        /// Lower bound in milliseconds
        #[serde(default = "default_uniform_min_ms")]
        min_ms: u64,
        /// Upper bound in milliseconds
        #[serde(default = "default_uniform_max_ms")]
        max_ms: u64,
    },
}

fn default_period_ms() -> u64 {
    FixedBackOffPolicy::DEFAULT_PERIOD.as_millis() as u64
}

fn default_initial_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

fn default_uniform_min_ms() -> u64 {
    500
}

fn default_uniform_max_ms() -> u64 {
    1500
}

impl BackOffConfig {
    fn validate(&self) -> Result<()> {
        match *self {
            Self::None | Self::Fixed { .. } => Ok(()),
            Self::Exponential {
                initial_ms,
                max_ms,
                multiplier,
                jitter,
            } => {
                if initial_ms > max_ms {
                    return Err(ConfigError::invalid(
                        "backoff.initial_ms",
                        format!("{} exceeds max_ms {}", initial_ms, max_ms),
                    ));
                }
                if !multiplier.is_finite() || multiplier < 1.0 {
                    return Err(ConfigError::invalid(
                        "backoff.multiplier",
                        format!("must be finite and at least 1.0, got {}", multiplier),
                    ));
                }
                if !(0.0..=1.0).contains(&jitter) {
                    return Err(ConfigError::invalid(
                        "backoff.jitter",
                        format!("must be within 0.0..=1.0, got {}", jitter),
                    ));
                }
                Ok(())
            }
            Self::Uniform { min_ms, max_ms } if min_ms > max_ms => Err(ConfigError::invalid(
                "backoff.min_ms",
                format!("{} exceeds max_ms {}", min_ms, max_ms),
            )),
            Self::Uniform { .. } => Ok(()),
        }
    }

    fn build(&self) -> Box<dyn BackOffPolicy> {
        match *self {
            Self::None => Box::new(NoBackOffPolicy),
            Self::Fixed { period_ms } => {
                Box::new(FixedBackOffPolicy::new(Duration::from_millis(period_ms)))
            }
            Self::Exponential {
                initial_ms,
                max_ms,
                multiplier,
                jitter,
            } => Box::new(
                ExponentialBackOffPolicy::builder()
                    .initial_delay(Duration::from_millis(initial_ms))
                    .max_delay(Duration::from_millis(max_ms))
                    .multiplier(multiplier)
                    .jitter(jitter)
                    .build(),
            ),
            Self::Uniform { min_ms, max_ms } => Box::new(UniformRandomBackOffPolicy::new(
                Duration::from_millis(min_ms),
                Duration::from_millis(max_ms),
            )),
        }
    }
}

impl RetryConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// This will look for:
    /// - `REBOUND_NAME` for the context label
    /// - `REBOUND_MAX_ATTEMPTS` for the attempt cap
    /// - `REBOUND_TIMEOUT_MS` for the overall time budget
    /// - `REBOUND_BACKOFF_MS` for a fixed pause between attempts
    ///
    /// Values that do not parse as numbers are ignored.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        use std::env;

        let mut config = Self::default();

        if let Ok(name) = env::var("REBOUND_NAME") {
            config.name = Some(name);
        }

        if let Ok(raw) = env::var("REBOUND_MAX_ATTEMPTS") {
            match raw.parse::<u32>() {
                Ok(max_attempts) => config.max_attempts = max_attempts,
                Err(_) => tracing::warn!(value = %raw, "Ignoring unparsable REBOUND_MAX_ATTEMPTS"),
            }
        }

        if let Ok(raw) = env::var("REBOUND_TIMEOUT_MS")
            && let Ok(timeout_ms) = raw.parse::<u64>()
        {
            config.timeout_ms = Some(timeout_ms);
        }

        if let Ok(raw) = env::var("REBOUND_BACKOFF_MS")
            && let Ok(period_ms) = raw.parse::<u64>()
        {
            config.backoff = BackOffConfig::Fixed { period_ms };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every field holds a usable value.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::invalid("timeout_ms", "must be positive"));
        }
        self.backoff.validate()
    }

    /// Build a template from this configuration.
    ///
    /// With `timeout_ms` set, a retry is allowed only while both the attempt
    /// cap and the time budget allow it.
    pub fn build_template(&self) -> Result<RetryTemplate> {
        self.validate()?;

        let mut builder = RetryTemplate::builder().back_off_policy(self.backoff.build());
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }

        builder = match self.timeout_ms {
            Some(timeout_ms) => builder.retry_policy(
                CompositeRetryPolicy::pessimistic()
                    .with(SimpleRetryPolicy::new(self.max_attempts))
                    .with(TimeoutRetryPolicy::new(Duration::from_millis(timeout_ms))),
            ),
            None => builder.max_attempts(self.max_attempts),
        };

        tracing::debug!(
            name = self.name.as_deref().unwrap_or("-"),
            max_attempts = self.max_attempts,
            timeout_ms = ?self.timeout_ms,
            "Built retry template from configuration"
        );

        Ok(builder.build())
    }
}
