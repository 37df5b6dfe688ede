//! Deployment environment tag.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Where the server is running.
///
/// Controls cookie hardening and whether internal error details reach clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: verbose errors, relaxed cookies.
    #[default]
    Development,
    /// Production: secure cookies, suppressed error details.
    Production,
    /// Automated tests.
    Test,
}

impl Environment {
    /// Returns the lowercase tag reported by the health endpoint.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    /// Whether this is a production deployment.
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Whether internal error messages may be returned to clients.
    pub const fn exposes_error_details(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::Validation {
                message: format!(
                    "unknown environment '{other}', expected development, production, or test"
                ),
            }),
        }
    }
}
