//! Per-client request rate limiting configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default window (15 minutes).
const fn default_window() -> Duration {
    Duration::from_millis(900_000)
}

/// Default request budget per window.
const fn default_max_requests() -> u64 {
    100
}

/// Configuration for per-client token bucket rate limiting.
///
/// Each client may burst up to `max_requests`, and the budget refills evenly
/// over `window`.
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # use medibills_types::config::RateLimitConfig;
/// let config = RateLimitConfig::builder()
///     .window(Duration::from_secs(60))
///     .max_requests(30)
///     .build()
///     .expect("valid rate limit config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Period over which `max_requests` refill. Must be > 0.
    #[serde(default = "default_window", with = "super::humantime_serde")]
    pub window: Duration,
    /// Maximum requests per client per window (bucket capacity). Must be > 0.
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
}

#[bon::bon]
impl RateLimitConfig {
    /// Creates a new rate limit configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if either value is zero.
    #[builder]
    pub fn new(
        #[builder(default = default_window())] window: Duration,
        #[builder(default = default_max_requests())] max_requests: u64,
    ) -> Result<Self, ConfigError> {
        let config = Self { window, max_requests };
        config.validate()?;
        Ok(config)
    }
}

impl RateLimitConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.is_zero() {
            return Err(ConfigError::Validation { message: "window must be > 0".to_string() });
        }
        if self.max_requests == 0 {
            return Err(ConfigError::Validation {
                message: "max_requests must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.max_requests as f64 / self.window.as_secs_f64()
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { window: default_window(), max_requests: default_max_requests() }
    }
}
