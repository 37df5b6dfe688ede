//! Medical bill repository.
//!
//! Bills embed their provider. The bill side of the bill ↔ service event
//! relation lives here too: listing, attaching, and detaching events.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medibills_types::{
    BillId, BillView, MedicalBill, ServiceEventId, ServiceEventView, UserId,
    inputs::{BillPatch, NewBill},
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Result, StoreError},
    links, ownership,
    ownership::BILL,
    providers::{provider_summaries, summary_for},
    repository::{OwnedRepository, begin_write, money, now},
    service_events,
};

#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    id: Uuid,
    user_id: Uuid,
    medical_provider_id: Uuid,
    date_of_service: NaiveDate,
    total: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BillRow> for MedicalBill {
    type Error = StoreError;

    fn try_from(row: BillRow) -> Result<Self> {
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            medical_provider_id: row.medical_provider_id.into(),
            date_of_service: row.date_of_service,
            total: money("total", row.total)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_BILL: &str = "SELECT id, user_id, medical_provider_id, date_of_service, total, \
     created_at, updated_at FROM medical_bills";

async fn expand(conn: &mut SqliteConnection, rows: Vec<BillRow>) -> Result<Vec<BillView>> {
    let bills = rows.into_iter().map(MedicalBill::try_from).collect::<Result<Vec<_>>>()?;
    let providers = provider_summaries(conn, bills.iter().map(|b| b.medical_provider_id)).await?;
    bills
        .into_iter()
        .map(|bill| {
            let medical_provider = summary_for(&providers, bill.medical_provider_id)?;
            Ok(BillView { bill, medical_provider })
        })
        .collect()
}

/// Bills owned by a user.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut SqliteConnection, user: UserId, id: BillId) -> Result<BillView> {
        let sql = format!("{SELECT_BILL} WHERE id = ? AND user_id = ?");
        let row: Option<BillRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        let row = row.ok_or(StoreError::NotFound { entity: BILL })?;
        expand(conn, vec![row]).await?.pop().ok_or(StoreError::NotFound { entity: BILL })
    }

    /// Service events linked to the bill.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the bill is not owned by `user`.
    pub async fn service_events(&self, user: UserId, bill: BillId) -> Result<Vec<ServiceEventView>> {
        let mut conn = self.pool.acquire().await?;
        ownership::ensure_bill(&mut conn, user, bill).await?;
        service_events::linked_to_bill(&mut conn, user, bill).await
    }

    /// Links every event in `events` to the bill. Existing links are kept.
    ///
    /// All ids are validated before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the bill or any event is not owned
    /// by `user`.
    pub async fn attach_service_events(
        &self,
        user: UserId,
        bill: BillId,
        events: &[ServiceEventId],
    ) -> Result<Vec<ServiceEventView>> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_bill(&mut tx, user, bill).await?;
        ownership::ensure_service_events(&mut tx, user, events).await?;
        let mut added = 0;
        for event in events {
            added += links::link_bills_to_event(&mut tx, *event, &[bill]).await?;
        }
        let linked = service_events::linked_to_bill(&mut tx, user, bill).await?;
        tx.commit().await?;
        debug!(bill = %bill, added, "Service events attached to bill");
        Ok(linked)
    }

    /// Removes the link between the bill and `event`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if either side is not owned by `user`.
    pub async fn detach_service_event(
        &self,
        user: UserId,
        bill: BillId,
        event: ServiceEventId,
    ) -> Result<()> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_bill(&mut tx, user, bill).await?;
        ownership::ensure_service_event(&mut tx, user, event).await?;
        let removed = links::unlink_bill_from_event(&mut tx, event, bill).await?;
        tx.commit().await?;
        debug!(bill = %bill, event = %event, removed, "Service event detached from bill");
        Ok(())
    }
}

#[async_trait]
impl OwnedRepository for BillRepository {
    type Id = BillId;
    type New = NewBill;
    type Patch = BillPatch;
    type View = BillView;

    const ENTITY: &'static str = BILL;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<BillView>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{SELECT_BILL} WHERE user_id = ? ORDER BY created_at DESC, rowid DESC");
        let rows: Vec<BillRow> =
            sqlx::query_as(&sql).bind(user.as_uuid()).fetch_all(&mut *conn).await?;
        expand(&mut conn, rows).await
    }

    async fn get_for_user(&self, user: UserId, id: BillId) -> Result<BillView> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, user, id).await
    }

    async fn create_for_user(&self, user: UserId, input: NewBill) -> Result<BillView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_provider(&mut tx, user, input.medical_provider_id).await?;

        let id = BillId::generate();
        let at = now();
        sqlx::query(
            "INSERT INTO medical_bills (id, user_id, medical_provider_id, date_of_service, total, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .bind(input.medical_provider_id.as_uuid())
        .bind(input.date_of_service)
        .bind(input.total.cents())
        .bind(at)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        debug!(bill = %id, user = %user, total = %view.bill.total, "Bill created");
        Ok(view)
    }

    async fn update_for_user(&self, user: UserId, id: BillId, patch: BillPatch) -> Result<BillView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_bill(&mut tx, user, id).await?;
        if let Some(provider) = patch.medical_provider_id {
            ownership::ensure_provider(&mut tx, user, provider).await?;
        }

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE medical_bills SET updated_at = ");
        query.push_bind(now());
        if let Some(provider) = patch.medical_provider_id {
            query.push(", medical_provider_id = ").push_bind(provider.as_uuid());
        }
        if let Some(date) = patch.date_of_service {
            query.push(", date_of_service = ").push_bind(date);
        }
        if let Some(total) = patch.total {
            query.push(", total = ").push_bind(total.cents());
        }
        query
            .push(" WHERE id = ")
            .push_bind(id.as_uuid())
            .push(" AND user_id = ")
            .push_bind(user.as_uuid());

        if query.build().execute(&mut *tx).await?.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: BILL });
        }

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        Ok(view)
    }

    async fn delete_for_user(&self, user: UserId, id: BillId) -> Result<()> {
        let result = sqlx::query("DELETE FROM medical_bills WHERE id = ? AND user_id = ?")
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: BILL });
        }
        debug!(bill = %id, user = %user, "Bill deleted");
        Ok(())
    }
}
