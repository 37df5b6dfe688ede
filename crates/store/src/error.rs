//! Error types for the MediBills store.

use medibills_types::{ErrorCode, MoneyError};
use snafu::Snafu;

/// Result type alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors that can occur during store operations.
///
/// Raw `sqlx` errors are classified on conversion: unique and foreign-key
/// violations become [`StoreError::Conflict`], everything else stays a
/// [`StoreError::Database`] and is treated as internal by callers.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// Row does not exist, or exists but belongs to another user.
    #[snafu(display("{entity} not found"))]
    NotFound {
        /// Human-readable entity label, e.g. `"Medical bill"`.
        entity: &'static str,
    },

    /// Unique value already taken, or a delete blocked by dependent rows.
    #[snafu(display("{message}"))]
    Conflict {
        /// Client-facing description of the conflict.
        message: String,
    },

    /// The database could not be opened.
    #[snafu(display("Failed to open database {url}: {source}"))]
    Open {
        /// Connection string that failed.
        url: String,
        /// The underlying sqlx error.
        source: sqlx::Error,
    },

    /// Schema creation failed.
    #[snafu(display("Failed to apply schema: {source}"))]
    Migration {
        /// The underlying sqlx error.
        source: sqlx::Error,
    },

    /// A stored amount violated the money invariants.
    #[snafu(display("Invalid {column} in stored row: {source}"))]
    Decode {
        /// Column that held the bad value.
        column: &'static str,
        /// Why the value was rejected.
        source: MoneyError,
    },

    /// The session store could not be set up from the given secret or lifetimes.
    #[snafu(display("Invalid session setup: {message}"))]
    SessionSetup {
        /// What was wrong.
        message: String,
    },

    /// Any other database failure.
    #[snafu(display("Database error: {source}"))]
    Database {
        /// The underlying sqlx error.
        source: sqlx::Error,
    },
}

impl StoreError {
    /// Maps this error into the shared error catalog.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::Open { .. }
            | Self::Migration { .. }
            | Self::Decode { .. }
            | Self::SessionSetup { .. }
            | Self::Database { .. } => ErrorCode::Internal,
        }
    }

    /// Returns `true` if this is a [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a [`StoreError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(source: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &source {
            if db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint") {
                return Self::Conflict { message: unique_violation_message(db_err.message()) };
            }
            // SQLite reports deferred (NO ACTION) violations with the same message.
            if db_err.is_foreign_key_violation()
                || db_err.message().contains("FOREIGN KEY constraint failed")
            {
                return Self::Conflict {
                    message: "Record is still referenced by other records".to_string(),
                };
            }
        }
        Self::Database { source }
    }
}

/// Turns `UNIQUE constraint failed: users.email` into a client message.
fn unique_violation_message(raw: &str) -> String {
    if raw.contains("users.username") {
        "Username already exists".to_string()
    } else if raw.contains("users.email") {
        "Email already exists".to_string()
    } else {
        "Record already exists".to_string()
    }
}
