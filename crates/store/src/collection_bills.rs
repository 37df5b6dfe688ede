//! Collection bill repository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medibills_types::{
    CollectionBill, CollectionBillId, CollectionBillView, UserId,
    inputs::{CollectionBillPatch, NewCollectionBill},
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Result, StoreError},
    ownership,
    ownership::COLLECTION_BILL,
    providers::{provider_summaries, summary_for},
    repository::{OwnedRepository, begin_write, money, now},
};

#[derive(Debug, sqlx::FromRow)]
struct CollectionBillRow {
    id: Uuid,
    user_id: Uuid,
    medical_provider_id: Uuid,
    date_of_notice: NaiveDate,
    date_of_service: NaiveDate,
    amount_total: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CollectionBillRow> for CollectionBill {
    type Error = StoreError;

    fn try_from(row: CollectionBillRow) -> Result<Self> {
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            medical_provider_id: row.medical_provider_id.into(),
            date_of_notice: row.date_of_notice,
            date_of_service: row.date_of_service,
            amount_total: money("amount_total", row.amount_total)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLLECTION_BILL: &str = "SELECT id, user_id, medical_provider_id, date_of_notice, \
     date_of_service, amount_total, created_at, updated_at FROM collection_bills";

async fn expand(
    conn: &mut SqliteConnection,
    rows: Vec<CollectionBillRow>,
) -> Result<Vec<CollectionBillView>> {
    let bills = rows.into_iter().map(CollectionBill::try_from).collect::<Result<Vec<_>>>()?;
    let providers = provider_summaries(conn, bills.iter().map(|b| b.medical_provider_id)).await?;
    bills
        .into_iter()
        .map(|collection_bill| {
            let medical_provider = summary_for(&providers, collection_bill.medical_provider_id)?;
            Ok(CollectionBillView { collection_bill, medical_provider })
        })
        .collect()
}

/// Collection notices owned by a user.
#[derive(Debug, Clone)]
pub struct CollectionBillRepository {
    pool: SqlitePool,
}

impl CollectionBillRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(
        conn: &mut SqliteConnection,
        user: UserId,
        id: CollectionBillId,
    ) -> Result<CollectionBillView> {
        let sql = format!("{SELECT_COLLECTION_BILL} WHERE id = ? AND user_id = ?");
        let row: Option<CollectionBillRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        let row = row.ok_or(StoreError::NotFound { entity: COLLECTION_BILL })?;
        expand(conn, vec![row]).await?.pop().ok_or(StoreError::NotFound { entity: COLLECTION_BILL })
    }
}

#[async_trait]
impl OwnedRepository for CollectionBillRepository {
    type Id = CollectionBillId;
    type New = NewCollectionBill;
    type Patch = CollectionBillPatch;
    type View = CollectionBillView;

    const ENTITY: &'static str = COLLECTION_BILL;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<CollectionBillView>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "{SELECT_COLLECTION_BILL} WHERE user_id = ? ORDER BY created_at DESC, rowid DESC"
        );
        let rows: Vec<CollectionBillRow> =
            sqlx::query_as(&sql).bind(user.as_uuid()).fetch_all(&mut *conn).await?;
        expand(&mut conn, rows).await
    }

    async fn get_for_user(&self, user: UserId, id: CollectionBillId) -> Result<CollectionBillView> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, user, id).await
    }

    async fn create_for_user(
        &self,
        user: UserId,
        input: NewCollectionBill,
    ) -> Result<CollectionBillView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_provider(&mut tx, user, input.medical_provider_id).await?;

        let id = CollectionBillId::generate();
        let at = now();
        sqlx::query(
            "INSERT INTO collection_bills (id, user_id, medical_provider_id, date_of_notice, \
             date_of_service, amount_total, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .bind(input.medical_provider_id.as_uuid())
        .bind(input.date_of_notice)
        .bind(input.date_of_service)
        .bind(input.amount_total.cents())
        .bind(at)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        debug!(collection_bill = %id, user = %user, "Collection bill created");
        Ok(view)
    }

    async fn update_for_user(
        &self,
        user: UserId,
        id: CollectionBillId,
        patch: CollectionBillPatch,
    ) -> Result<CollectionBillView> {
        let mut tx = begin_write(&self.pool).await?;
        // Gate the target first so a foreign bill reports its own not-found.
        let owned: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM collection_bills WHERE id = ? AND user_id = ?")
                .bind(id.as_uuid())
                .bind(user.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Err(StoreError::NotFound { entity: COLLECTION_BILL });
        }
        if let Some(provider) = patch.medical_provider_id {
            ownership::ensure_provider(&mut tx, user, provider).await?;
        }

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE collection_bills SET updated_at = ");
        query.push_bind(now());
        if let Some(provider) = patch.medical_provider_id {
            query.push(", medical_provider_id = ").push_bind(provider.as_uuid());
        }
        if let Some(date) = patch.date_of_notice {
            query.push(", date_of_notice = ").push_bind(date);
        }
        if let Some(date) = patch.date_of_service {
            query.push(", date_of_service = ").push_bind(date);
        }
        if let Some(amount) = patch.amount_total {
            query.push(", amount_total = ").push_bind(amount.cents());
        }
        query
            .push(" WHERE id = ")
            .push_bind(id.as_uuid())
            .push(" AND user_id = ")
            .push_bind(user.as_uuid());

        if query.build().execute(&mut *tx).await?.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: COLLECTION_BILL });
        }

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        Ok(view)
    }

    async fn delete_for_user(&self, user: UserId, id: CollectionBillId) -> Result<()> {
        let result = sqlx::query("DELETE FROM collection_bills WHERE id = ? AND user_id = ?")
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: COLLECTION_BILL });
        }
        debug!(collection_bill = %id, user = %user, "Collection bill deleted");
        Ok(())
    }
}
