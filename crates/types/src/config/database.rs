//! Database connection pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default connection string: a SQLite file next to the working directory.
fn default_url() -> String {
    "sqlite:./database.sqlite".to_string()
}

/// Default pool size.
const fn default_max_connections() -> u32 {
    5
}

/// Default time to wait for a free pooled connection (30s).
const fn default_acquire_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Default SQLite busy timeout (5s).
const fn default_busy_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Configuration for the SQLite connection pool.
///
/// # Example
///
/// ```no_run
/// # use medibills_types::config::DatabaseConfig;
/// let config = DatabaseConfig::builder()
///     .url("sqlite:/var/lib/medibills/medibills.sqlite".to_string())
///     .max_connections(8)
///     .build()
///     .expect("valid database config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string, `sqlite:` scheme.
    #[serde(default = "default_url")]
    pub url: String,
    /// Maximum pooled connections. Must be > 0.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a request waits for a pooled connection before failing.
    #[serde(default = "default_acquire_timeout", with = "super::humantime_serde")]
    pub acquire_timeout: Duration,
    /// How long SQLite retries a locked database before returning `SQLITE_BUSY`.
    #[serde(default = "default_busy_timeout", with = "super::humantime_serde")]
    pub busy_timeout: Duration,
}

#[bon::bon]
impl DatabaseConfig {
    /// Creates a new database configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the URL is not a `sqlite:` URL or
    /// any count or timeout is zero.
    #[builder]
    pub fn new(
        #[builder(default = default_url())] url: String,
        #[builder(default = default_max_connections())] max_connections: u32,
        #[builder(default = default_acquire_timeout())] acquire_timeout: Duration,
        #[builder(default = default_busy_timeout())] busy_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { url, max_connections, acquire_timeout, busy_timeout };
        config.validate()?;
        Ok(config)
    }
}

impl DatabaseConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.url.starts_with("sqlite:") {
            return Err(ConfigError::Validation {
                message: format!("database url must start with sqlite:, got {}", self.url),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Validation {
                message: "max_connections must be > 0".to_string(),
            });
        }
        if self.acquire_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "acquire_timeout must be > 0".to_string(),
            });
        }
        if self.busy_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "busy_timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            acquire_timeout: default_acquire_timeout(),
            busy_timeout: default_busy_timeout(),
        }
    }
}
