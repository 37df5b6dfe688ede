//! Ownership gates for foreign references.
//!
//! Every helper runs inside the caller's transaction and checks that the
//! referenced row exists with `user_id` equal to the caller. A row owned by
//! someone else is indistinguishable from a missing one.

use std::collections::BTreeSet;

use medibills_types::{BillId, EobId, PaymentId, ProviderId, ServiceEventId, UserId};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::{
    error::{Result, StoreError},
    repository::push_id_list,
};

pub(crate) const PROVIDER: &str = "Medical provider";
pub(crate) const BILL: &str = "Medical bill";
pub(crate) const BILLS: &str = "One or more medical bills";
pub(crate) const CHARGE: &str = "Medical bill charge";
pub(crate) const EOB: &str = "Explanation of benefits";
pub(crate) const COLLECTION_BILL: &str = "Collection bill";
pub(crate) const SERVICE_EVENT: &str = "Medical service event";
pub(crate) const SERVICE_EVENTS: &str = "One or more medical service events";
pub(crate) const PAYMENT: &str = "Medical bill payment";

async fn owned_row_exists(
    conn: &mut SqliteConnection,
    table: &'static str,
    id: Uuid,
    user: UserId,
) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {table} WHERE id = ? AND user_id = ?");
    let found: Option<i64> = sqlx::query_scalar(&sql)
        .bind(id)
        .bind(user.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

async fn ensure_owned(
    conn: &mut SqliteConnection,
    table: &'static str,
    entity: &'static str,
    id: Uuid,
    user: UserId,
) -> Result<()> {
    if owned_row_exists(conn, table, id, user).await? {
        Ok(())
    } else {
        Err(StoreError::NotFound { entity })
    }
}

pub(crate) async fn ensure_provider(
    conn: &mut SqliteConnection,
    user: UserId,
    id: ProviderId,
) -> Result<()> {
    ensure_owned(conn, "medical_providers", PROVIDER, id.as_uuid(), user).await
}

pub(crate) async fn ensure_eob(conn: &mut SqliteConnection, user: UserId, id: EobId) -> Result<()> {
    ensure_owned(conn, "explanation_of_benefits", EOB, id.as_uuid(), user).await
}

pub(crate) async fn ensure_bill(conn: &mut SqliteConnection, user: UserId, id: BillId) -> Result<()> {
    ensure_owned(conn, "medical_bills", BILL, id.as_uuid(), user).await
}

pub(crate) async fn ensure_service_event(
    conn: &mut SqliteConnection,
    user: UserId,
    id: ServiceEventId,
) -> Result<()> {
    ensure_owned(conn, "medical_service_events", SERVICE_EVENT, id.as_uuid(), user).await
}

pub(crate) async fn ensure_payment(
    conn: &mut SqliteConnection,
    user: UserId,
    id: PaymentId,
) -> Result<()> {
    ensure_owned(conn, "medical_bill_payments", PAYMENT, id.as_uuid(), user).await
}

/// Checks a whole id list at once; duplicates are ignored.
///
/// Fails with `entity` if any id is missing or foreign.
async fn ensure_all_owned(
    conn: &mut SqliteConnection,
    table: &'static str,
    entity: &'static str,
    ids: &[Uuid],
    user: UserId,
) -> Result<()> {
    let unique: BTreeSet<Uuid> = ids.iter().copied().collect();
    if unique.is_empty() {
        return Ok(());
    }

    let mut query: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new(format!("SELECT COUNT(*) FROM {table} WHERE user_id = "));
    query.push_bind(user.as_uuid()).push(" AND id IN ");
    push_id_list(&mut query, unique.iter().copied());

    let owned: i64 = query.build_query_scalar().fetch_one(&mut *conn).await?;
    if usize::try_from(owned).ok() == Some(unique.len()) {
        Ok(())
    } else {
        Err(StoreError::NotFound { entity })
    }
}

pub(crate) async fn ensure_bills(
    conn: &mut SqliteConnection,
    user: UserId,
    ids: &[BillId],
) -> Result<()> {
    let raw: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
    ensure_all_owned(conn, "medical_bills", BILLS, &raw, user).await
}

pub(crate) async fn ensure_service_events(
    conn: &mut SqliteConnection,
    user: UserId,
    ids: &[ServiceEventId],
) -> Result<()> {
    let raw: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
    ensure_all_owned(conn, "medical_service_events", SERVICE_EVENTS, &raw, user).await
}
