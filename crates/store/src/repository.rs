//! The ownership-scoped repository contract.
//!
//! Every owned entity exposes the same five operations, each taking the
//! caller's [`UserId`] as the scoping predicate. Implementations put that
//! predicate in the SQL statement itself; nothing is fetched unscoped and
//! filtered afterwards.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use medibills_types::{Money, UserId};
use snafu::ResultExt;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::{DecodeSnafu, Result};

/// CRUD over rows owned by a single user.
///
/// # Errors
///
/// All operations return [`crate::StoreError::NotFound`] when the target row,
/// or any referenced row, is missing or owned by another user.
/// [`crate::StoreError::Conflict`] surfaces storage-level constraint
/// violations such as a provider delete blocked by dependents.
#[async_trait]
pub trait OwnedRepository: Send + Sync {
    /// Identifier type of the entity.
    type Id: Copy + Send + Sync + 'static;
    /// Insert payload.
    type New: Send + 'static;
    /// Partial update payload.
    type Patch: Send + 'static;
    /// Returned representation, with related data expanded.
    type View: Send + 'static;

    /// Label used in not-found messages, e.g. `"Medical bill"`.
    const ENTITY: &'static str;

    /// All rows owned by `user`, newest first.
    async fn list_for_user(&self, user: UserId) -> Result<Vec<Self::View>>;

    /// One row, if it exists and belongs to `user`.
    async fn get_for_user(&self, user: UserId, id: Self::Id) -> Result<Self::View>;

    /// Validates referenced rows and inserts, atomically.
    async fn create_for_user(&self, user: UserId, input: Self::New) -> Result<Self::View>;

    /// Applies the supplied fields only.
    async fn update_for_user(
        &self,
        user: UserId,
        id: Self::Id,
        patch: Self::Patch,
    ) -> Result<Self::View>;

    /// Deletes the row, subject to the schema's referential rules.
    async fn delete_for_user(&self, user: UserId, id: Self::Id) -> Result<()>;
}

/// Begins a transaction that holds the write lock from its first statement.
///
/// Ownership checks and the write that follows them share one snapshot, and
/// concurrent writers queue on the connection's busy timeout instead of
/// failing with `SQLITE_BUSY` on lock upgrade.
pub(crate) async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Current time truncated to microseconds, so values survive a TEXT round trip
/// unchanged.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Rehydrates a stored cent amount.
pub(crate) fn money(column: &'static str, cents: i64) -> Result<Money> {
    Money::from_cents(cents).context(DecodeSnafu { column })
}

/// Rehydrates a nullable stored cent amount.
pub(crate) fn optional_money(column: &'static str, cents: Option<i64>) -> Result<Option<Money>> {
    cents.map(|c| money(column, c)).transpose()
}

/// Appends `(?, ?, ...)` with one bind per id. Callers skip empty lists.
pub(crate) fn push_id_list(query: &mut QueryBuilder<'_, Sqlite>, ids: impl IntoIterator<Item = Uuid>) {
    query.push("(");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_money_decodes_valid_cents() {
        assert_eq!(money("total", 15_000).unwrap().cents(), 15_000);
    }

    #[test]
    fn test_money_rejects_negative_cents() {
        let err = money("total", -1).unwrap_err();
        assert!(err.to_string().contains("total"));
    }

    #[test]
    fn test_optional_money_passes_null_through() {
        assert_eq!(optional_money("amount", None).unwrap(), None);
    }

    #[test]
    fn test_push_id_list_binds_each_id() {
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT 1 WHERE x IN ");
        push_id_list(&mut query, [Uuid::new_v4(), Uuid::new_v4()]);
        assert_eq!(query.sql(), "SELECT 1 WHERE x IN (?, ?)");
    }

    #[test]
    fn test_now_has_microsecond_precision() {
        let at = now();
        assert_eq!(at.timestamp_subsec_nanos() % 1_000, 0);
    }
}
