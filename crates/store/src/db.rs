//! Database handle and connection management for medibills-store.
//!
//! A [`Database`] owns a bounded SQLite connection pool. Every pooled
//! connection runs with `PRAGMA foreign_keys = ON`, so cascade, restrict, and
//! set-null rules from [`crate::tables`] are enforced by SQLite itself.
//!
//! # Example
//!
//! ```no_run
//! use medibills_store::Database;
//! use medibills_types::config::DatabaseConfig;
//!
//! # async fn example() -> medibills_store::Result<()> {
//! let db = Database::open(&DatabaseConfig::default()).await?;
//! db.migrate().await?;
//! db.health_check().await?;
//! db.close().await;
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use medibills_types::config::DatabaseConfig;
use snafu::ResultExt;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::{debug, info};

use crate::{
    bills::BillRepository,
    charges::ChargeRepository,
    collection_bills::CollectionBillRepository,
    eobs::EobRepository,
    error::{MigrationSnafu, OpenSnafu, Result},
    payments::PaymentRepository,
    providers::ProviderRepository,
    service_events::ServiceEventRepository,
    tables::{SCHEMA_SQL, Table},
    users::UserRepository,
};

/// The main database handle.
///
/// Cheap to clone: clones share the same pool. Repository accessors hand out
/// lightweight views over that pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (or creates) the database described by `config`.
    ///
    /// Does not apply the schema; call [`Database::migrate`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Open`] if the URL is malformed or the
    /// file cannot be opened.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .context(OpenSnafu { url: config.url.clone() })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .context(OpenSnafu { url: config.url.clone() })?;

        info!(url = %config.url, max_connections = config.max_connections, "Database opened");
        Ok(Self { pool })
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates every table and index if missing. Safe to run repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Migration`] if the DDL fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await.context(MigrationSnafu)?;
        debug!(tables = Table::COUNT, "Schema applied");
        Ok(())
    }

    /// Round-trips a trivial query to prove the pool can serve requests.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Database`] if no connection is usable.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Number of rows currently in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Database`] on query failure.
    pub async fn row_count(&self, table: Table) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Waits for in-flight queries and closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }

    // ========================================================================
    // Repositories
    // ========================================================================

    /// User accounts.
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    /// Medical providers.
    pub fn providers(&self) -> ProviderRepository {
        ProviderRepository::new(self.pool.clone())
    }

    /// Medical bills, including bill ↔ service event links.
    pub fn bills(&self) -> BillRepository {
        BillRepository::new(self.pool.clone())
    }

    /// Bill line items.
    pub fn charges(&self) -> ChargeRepository {
        ChargeRepository::new(self.pool.clone())
    }

    /// Explanations of benefits.
    pub fn eobs(&self) -> EobRepository {
        EobRepository::new(self.pool.clone())
    }

    /// Collection notices.
    pub fn collection_bills(&self) -> CollectionBillRepository {
        CollectionBillRepository::new(self.pool.clone())
    }

    /// Service events, including event → bill links.
    pub fn service_events(&self) -> ServiceEventRepository {
        ServiceEventRepository::new(self.pool.clone())
    }

    /// Payments, including payment → bill links.
    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }
}
