//! Medical bill charge repository.
//!
//! Charges carry no `user_id`; ownership follows the parent bill, so every
//! statement scopes through `medical_bills.user_id`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medibills_types::{
    BillSummary, ChargeId, ChargeView, MedicalBillCharge, ProviderId, UserId,
    inputs::{ChargePatch, NewCharge},
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Result, StoreError},
    ownership,
    ownership::CHARGE,
    repository::{OwnedRepository, begin_write, money, now},
};

#[derive(Debug, sqlx::FromRow)]
struct ChargeRow {
    id: Uuid,
    medical_bill_id: Uuid,
    amount: i64,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    bill_provider_id: Uuid,
    bill_date_of_service: NaiveDate,
    bill_total: i64,
}

impl TryFrom<ChargeRow> for ChargeView {
    type Error = StoreError;

    fn try_from(row: ChargeRow) -> Result<Self> {
        let medical_bill = BillSummary {
            id: row.medical_bill_id.into(),
            medical_provider_id: ProviderId::from_uuid(row.bill_provider_id),
            date_of_service: row.bill_date_of_service,
            total: money("total", row.bill_total)?,
        };
        let charge = MedicalBillCharge {
            id: row.id.into(),
            medical_bill_id: row.medical_bill_id.into(),
            amount: money("amount", row.amount)?,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        Ok(Self { charge, medical_bill })
    }
}

const SELECT_CHARGE: &str = "SELECT c.id, c.medical_bill_id, c.amount, c.description, \
     c.created_at, c.updated_at, b.medical_provider_id AS bill_provider_id, \
     b.date_of_service AS bill_date_of_service, b.total AS bill_total \
     FROM medical_bill_charges c JOIN medical_bills b ON b.id = c.medical_bill_id";

/// Charges on bills owned by a user.
#[derive(Debug, Clone)]
pub struct ChargeRepository {
    pool: SqlitePool,
}

impl ChargeRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut SqliteConnection, user: UserId, id: ChargeId) -> Result<ChargeView> {
        let sql = format!("{SELECT_CHARGE} WHERE c.id = ? AND b.user_id = ?");
        let row: Option<ChargeRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        row.ok_or(StoreError::NotFound { entity: CHARGE })?.try_into()
    }
}

#[async_trait]
impl OwnedRepository for ChargeRepository {
    type Id = ChargeId;
    type New = NewCharge;
    type Patch = ChargePatch;
    type View = ChargeView;

    const ENTITY: &'static str = CHARGE;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<ChargeView>> {
        let sql = format!(
            "{SELECT_CHARGE} WHERE b.user_id = ? ORDER BY c.created_at DESC, c.rowid DESC"
        );
        let rows: Vec<ChargeRow> =
            sqlx::query_as(&sql).bind(user.as_uuid()).fetch_all(&self.pool).await?;
        rows.into_iter().map(ChargeView::try_from).collect()
    }

    async fn get_for_user(&self, user: UserId, id: ChargeId) -> Result<ChargeView> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, user, id).await
    }

    async fn create_for_user(&self, user: UserId, input: NewCharge) -> Result<ChargeView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_bill(&mut tx, user, input.medical_bill_id).await?;

        let id = ChargeId::generate();
        let at = now();
        sqlx::query(
            "INSERT INTO medical_bill_charges (id, medical_bill_id, amount, description, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_uuid())
        .bind(input.medical_bill_id.as_uuid())
        .bind(input.amount.cents())
        .bind(&input.description)
        .bind(at)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        debug!(charge = %id, bill = %input.medical_bill_id, "Charge created");
        Ok(view)
    }

    async fn update_for_user(
        &self,
        user: UserId,
        id: ChargeId,
        patch: ChargePatch,
    ) -> Result<ChargeView> {
        let mut tx = begin_write(&self.pool).await?;

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE medical_bill_charges SET updated_at = ");
        query.push_bind(now());
        if let Some(amount) = patch.amount {
            query.push(", amount = ").push_bind(amount.cents());
        }
        if let Some(description) = patch.description {
            query.push(", description = ").push_bind(description);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id.as_uuid())
            .push(" AND medical_bill_id IN (SELECT id FROM medical_bills WHERE user_id = ")
            .push_bind(user.as_uuid())
            .push(")");

        if query.build().execute(&mut *tx).await?.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: CHARGE });
        }

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        Ok(view)
    }

    async fn delete_for_user(&self, user: UserId, id: ChargeId) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM medical_bill_charges WHERE id = ? \
             AND medical_bill_id IN (SELECT id FROM medical_bills WHERE user_id = ?)",
        )
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: CHARGE });
        }
        debug!(charge = %id, user = %user, "Charge deleted");
        Ok(())
    }
}
