//! Startup sequence: open the database, apply the schema, wire state.

use medibills_api::AppState;
use medibills_store::{Database, StoreError};
use medibills_types::config::ConfigError;
use snafu::{ResultExt, Snafu};
use tracing::info;

use crate::config::Config;

/// Error type for bootstrap operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BootstrapError {
    /// A configuration section failed validation.
    #[snafu(display("configuration error: {source}"))]
    Config {
        /// The validation failure.
        source: ConfigError,
    },

    /// The database could not be opened, migrated, or cleaned.
    #[snafu(display("database error: {source}"))]
    Database {
        /// The store failure.
        source: StoreError,
    },
}

/// Opens the configured database and applies the schema.
///
/// # Errors
///
/// Returns [`BootstrapError`] if the configuration is invalid or the schema
/// cannot be applied.
pub async fn open_database(config: &Config) -> Result<Database, BootstrapError> {
    let db_config = config.database().context(ConfigSnafu)?;
    let db = Database::open(&db_config).await.context(DatabaseSnafu)?;
    db.migrate().await.context(DatabaseSnafu)?;
    Ok(db)
}

/// Builds application state ready to serve.
///
/// Expired sessions left over from a previous run are purged. The health
/// phase is still `starting`; the caller marks it ready once it is listening.
///
/// # Errors
///
/// Returns [`BootstrapError`] on invalid configuration or database failure.
pub async fn bootstrap(config: &Config) -> Result<AppState, BootstrapError> {
    let settings = config.api_settings().context(ConfigSnafu)?;
    let secret = config.session_secret().context(ConfigSnafu)?;

    let db = open_database(config).await?;
    let state = AppState::new(db, &secret, settings).context(DatabaseSnafu)?;
    state.sessions.purge_expired().await.context(DatabaseSnafu)?;

    info!(environment = %config.environment, "Application state initialized");
    Ok(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use clap::Parser;
    use medibills_api::ServicePhase;
    use medibills_store::Table;
    use medibills_test_utils::TestDir;

    use super::*;
    use crate::config::Cli;

    fn config_for(dir: &TestDir, extra: &[&str]) -> Config {
        let url = dir.sqlite_url("bootstrap.sqlite");
        let argv = ["medibills", "--database-url", url.as_str(), "--environment", "test"];
        Cli::try_parse_from(argv.iter().chain(extra.iter())).unwrap().config
    }

    #[tokio::test]
    async fn test_bootstrap_creates_schema() {
        let dir = TestDir::new();
        let state = bootstrap(&config_for(&dir, &[])).await.unwrap();

        assert_eq!(state.health.phase(), ServicePhase::Starting);
        assert_eq!(state.db.row_count(Table::Users).await.unwrap(), 0);
        state.db.close().await;
    }

    #[tokio::test]
    async fn test_bootstrap_is_repeatable() {
        let dir = TestDir::new();
        let config = config_for(&dir, &[]);

        let first = bootstrap(&config).await.unwrap();
        first.db.close().await;
        let second = bootstrap(&config).await.unwrap();
        second.db.health_check().await.unwrap();
        second.db.close().await;
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_invalid_config() {
        let dir = TestDir::new();
        let config = config_for(&dir, &["--db-max-connections", "0"]);
        let err = bootstrap(&config).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Config { .. }));
    }
}
