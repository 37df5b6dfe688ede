//! Join-table helpers for the two many-to-many relations.
//!
//! Callers gate both endpoints through [`crate::ownership`] first; these
//! helpers only touch the join rows. Links are set-like: inserting an existing
//! pair is a no-op, and so is removing a missing one.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use medibills_types::{BillId, BillSummary, PaymentId, ProviderId, ServiceEventId};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::{
    error::Result,
    repository::{money, now, push_id_list},
};

/// Links each bill to the event. Returns the number of new links.
pub(crate) async fn link_bills_to_event(
    conn: &mut SqliteConnection,
    event: ServiceEventId,
    bills: &[BillId],
) -> Result<u64> {
    let mut added = 0;
    for bill in bills.iter().collect::<BTreeSet<_>>() {
        let at = now();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO medical_bill_service_events \
             (id, medical_bill_id, medical_service_event_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(bill.as_uuid())
        .bind(event.as_uuid())
        .bind(at)
        .bind(at)
        .execute(&mut *conn)
        .await?;
        added += result.rows_affected();
    }
    Ok(added)
}

pub(crate) async fn unlink_bill_from_event(
    conn: &mut SqliteConnection,
    event: ServiceEventId,
    bill: BillId,
) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM medical_bill_service_events \
         WHERE medical_bill_id = ? AND medical_service_event_id = ?",
    )
    .bind(bill.as_uuid())
    .bind(event.as_uuid())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Links each bill to the payment. Returns the number of new links.
pub(crate) async fn link_bills_to_payment(
    conn: &mut SqliteConnection,
    payment: PaymentId,
    bills: &[BillId],
) -> Result<u64> {
    let mut added = 0;
    for bill in bills.iter().collect::<BTreeSet<_>>() {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO medical_bill_payment_associations \
             (medical_bill_id, medical_bill_payment_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(bill.as_uuid())
        .bind(payment.as_uuid())
        .bind(now())
        .execute(&mut *conn)
        .await?;
        added += result.rows_affected();
    }
    Ok(added)
}

pub(crate) async fn unlink_bill_from_payment(
    conn: &mut SqliteConnection,
    payment: PaymentId,
    bill: BillId,
) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM medical_bill_payment_associations \
         WHERE medical_bill_id = ? AND medical_bill_payment_id = ?",
    )
    .bind(bill.as_uuid())
    .bind(payment.as_uuid())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

#[derive(Debug, sqlx::FromRow)]
struct LinkedBillRow {
    owner_id: Uuid,
    id: Uuid,
    medical_provider_id: Uuid,
    date_of_service: NaiveDate,
    total: i64,
}

impl LinkedBillRow {
    fn into_summary(self) -> Result<(Uuid, BillSummary)> {
        let summary = BillSummary {
            id: BillId::from_uuid(self.id),
            medical_provider_id: ProviderId::from_uuid(self.medical_provider_id),
            date_of_service: self.date_of_service,
            total: money("total", self.total)?,
        };
        Ok((self.owner_id, summary))
    }
}

/// Bill summaries grouped by the join column `owner_column`.
async fn linked_bills(
    conn: &mut SqliteConnection,
    join_table: &'static str,
    owner_column: &'static str,
    owners: BTreeSet<Uuid>,
) -> Result<HashMap<Uuid, Vec<BillSummary>>> {
    let mut grouped: HashMap<Uuid, Vec<BillSummary>> = HashMap::new();
    if owners.is_empty() {
        return Ok(grouped);
    }

    let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
        "SELECT l.{owner_column} AS owner_id, b.id, b.medical_provider_id, b.date_of_service, \
         b.total FROM {join_table} l JOIN medical_bills b ON b.id = l.medical_bill_id \
         WHERE l.{owner_column} IN "
    ));
    push_id_list(&mut query, owners);
    query.push(" ORDER BY b.date_of_service DESC, b.created_at DESC");

    let rows: Vec<LinkedBillRow> = query.build_query_as().fetch_all(&mut *conn).await?;
    for row in rows {
        let (owner, summary) = row.into_summary()?;
        grouped.entry(owner).or_default().push(summary);
    }
    Ok(grouped)
}

/// Linked bills for each service event in `events`.
pub(crate) async fn bills_for_events(
    conn: &mut SqliteConnection,
    events: impl IntoIterator<Item = ServiceEventId>,
) -> Result<HashMap<ServiceEventId, Vec<BillSummary>>> {
    let owners = events.into_iter().map(ServiceEventId::as_uuid).collect();
    let grouped =
        linked_bills(conn, "medical_bill_service_events", "medical_service_event_id", owners)
            .await?;
    Ok(grouped.into_iter().map(|(k, v)| (ServiceEventId::from_uuid(k), v)).collect())
}

/// Linked bills for each payment in `payments`.
pub(crate) async fn bills_for_payments(
    conn: &mut SqliteConnection,
    payments: impl IntoIterator<Item = PaymentId>,
) -> Result<HashMap<PaymentId, Vec<BillSummary>>> {
    let owners = payments.into_iter().map(PaymentId::as_uuid).collect();
    let grouped =
        linked_bills(conn, "medical_bill_payment_associations", "medical_bill_payment_id", owners)
            .await?;
    Ok(grouped.into_iter().map(|(k, v)| (PaymentId::from_uuid(k), v)).collect())
}
