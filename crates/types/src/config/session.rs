//! Session cookie and lifetime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

fn default_cookie_name() -> String {
    "medibills.sid".to_string()
}

/// Default idle window (24h), renewed on every authenticated request.
const fn default_idle_timeout() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

/// Default absolute lifetime cap (7 days).
const fn default_absolute_timeout() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

/// Configuration for server-side sessions.
///
/// A session expires after `idle_timeout` without use, and never lives longer
/// than `absolute_timeout` after login regardless of activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Rolling expiry window. Must be > 0.
    #[serde(default = "default_idle_timeout", with = "super::humantime_serde")]
    pub idle_timeout: Duration,
    /// Hard cap on session lifetime. Must be >= `idle_timeout`.
    #[serde(default = "default_absolute_timeout", with = "super::humantime_serde")]
    pub absolute_timeout: Duration,
    /// Emit `Secure` and `SameSite=Strict` cookies (production).
    #[serde(default)]
    pub secure_cookies: bool,
}

#[bon::bon]
impl SessionConfig {
    /// Creates a new session configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the cookie name is empty, the idle
    /// window is zero, or the absolute cap is shorter than the idle window.
    #[builder]
    pub fn new(
        #[builder(default = default_cookie_name())] cookie_name: String,
        #[builder(default = default_idle_timeout())] idle_timeout: Duration,
        #[builder(default = default_absolute_timeout())] absolute_timeout: Duration,
        #[builder(default)] secure_cookies: bool,
    ) -> Result<Self, ConfigError> {
        let config = Self { cookie_name, idle_timeout, absolute_timeout, secure_cookies };
        config.validate()?;
        Ok(config)
    }
}

impl SessionConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_name.is_empty() {
            return Err(ConfigError::Validation {
                message: "cookie_name must not be empty".to_string(),
            });
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "idle_timeout must be > 0".to_string(),
            });
        }
        if self.absolute_timeout < self.idle_timeout {
            return Err(ConfigError::Validation {
                message: format!(
                    "absolute_timeout ({:?}) must be >= idle_timeout ({:?})",
                    self.absolute_timeout, self.idle_timeout
                ),
            });
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            idle_timeout: default_idle_timeout(),
            absolute_timeout: default_absolute_timeout(),
            secure_cookies: false,
        }
    }
}
