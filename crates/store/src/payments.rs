//! Medical bill payment repository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medibills_types::{
    BillId, MedicalBillPayment, PaymentId, PaymentView, UserId,
    inputs::{NewPayment, PaymentPatch},
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Result, StoreError},
    links, ownership,
    ownership::PAYMENT,
    repository::{OwnedRepository, begin_write, money, now},
};

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    amount: i64,
    date: NaiveDate,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for MedicalBillPayment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            amount: money("amount", row.amount)?,
            date: row.date,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_PAYMENT: &str =
    "SELECT id, user_id, amount, date, notes, created_at, updated_at FROM medical_bill_payments";

async fn expand(conn: &mut SqliteConnection, rows: Vec<PaymentRow>) -> Result<Vec<PaymentView>> {
    let payments =
        rows.into_iter().map(MedicalBillPayment::try_from).collect::<Result<Vec<_>>>()?;
    let mut bills = links::bills_for_payments(conn, payments.iter().map(|p| p.id)).await?;
    Ok(payments
        .into_iter()
        .map(|payment| {
            let medical_bills = bills.remove(&payment.id).unwrap_or_default();
            PaymentView { payment, medical_bills }
        })
        .collect())
}

/// Payments owned by a user, with the bills each one covers.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut SqliteConnection, user: UserId, id: PaymentId) -> Result<PaymentView> {
        let sql = format!("{SELECT_PAYMENT} WHERE id = ? AND user_id = ?");
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        let row = row.ok_or(StoreError::NotFound { entity: PAYMENT })?;
        expand(conn, vec![row]).await?.pop().ok_or(StoreError::NotFound { entity: PAYMENT })
    }

    /// Links every bill in `bills` to the payment. Existing links are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the payment or any bill is not
    /// owned by `user`; nothing is linked in that case.
    pub async fn attach_bills(
        &self,
        user: UserId,
        payment: PaymentId,
        bills: &[BillId],
    ) -> Result<PaymentView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_payment(&mut tx, user, payment).await?;
        ownership::ensure_bills(&mut tx, user, bills).await?;
        let added = links::link_bills_to_payment(&mut tx, payment, bills).await?;
        let view = Self::fetch(&mut tx, user, payment).await?;
        tx.commit().await?;
        debug!(payment = %payment, added, "Bills attached to payment");
        Ok(view)
    }

    /// Removes the link between the payment and `bill`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if either side is not owned by `user`.
    pub async fn detach_bill(&self, user: UserId, payment: PaymentId, bill: BillId) -> Result<()> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_payment(&mut tx, user, payment).await?;
        ownership::ensure_bill(&mut tx, user, bill).await?;
        let removed = links::unlink_bill_from_payment(&mut tx, payment, bill).await?;
        tx.commit().await?;
        debug!(payment = %payment, bill = %bill, removed, "Bill detached from payment");
        Ok(())
    }
}

#[async_trait]
impl OwnedRepository for PaymentRepository {
    type Id = PaymentId;
    type New = NewPayment;
    type Patch = PaymentPatch;
    type View = PaymentView;

    const ENTITY: &'static str = PAYMENT;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<PaymentView>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{SELECT_PAYMENT} WHERE user_id = ? ORDER BY created_at DESC, rowid DESC");
        let rows: Vec<PaymentRow> =
            sqlx::query_as(&sql).bind(user.as_uuid()).fetch_all(&mut *conn).await?;
        expand(&mut conn, rows).await
    }

    async fn get_for_user(&self, user: UserId, id: PaymentId) -> Result<PaymentView> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, user, id).await
    }

    async fn create_for_user(&self, user: UserId, input: NewPayment) -> Result<PaymentView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_bills(&mut tx, user, &input.medical_bill_ids).await?;

        let id = PaymentId::generate();
        let at = now();
        sqlx::query(
            "INSERT INTO medical_bill_payments (id, user_id, amount, date, notes, created_at, \
             updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .bind(input.amount.cents())
        .bind(input.date)
        .bind(&input.notes)
        .bind(at)
        .bind(at)
        .execute(&mut *tx)
        .await?;
        links::link_bills_to_payment(&mut tx, id, &input.medical_bill_ids).await?;

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        debug!(payment = %id, user = %user, amount = %view.payment.amount, "Payment created");
        Ok(view)
    }

    async fn update_for_user(
        &self,
        user: UserId,
        id: PaymentId,
        patch: PaymentPatch,
    ) -> Result<PaymentView> {
        let mut tx = begin_write(&self.pool).await?;

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE medical_bill_payments SET updated_at = ");
        query.push_bind(now());
        if let Some(amount) = patch.amount {
            query.push(", amount = ").push_bind(amount.cents());
        }
        if let Some(date) = patch.date {
            query.push(", date = ").push_bind(date);
        }
        if let Some(notes) = patch.notes {
            query.push(", notes = ").push_bind(notes);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id.as_uuid())
            .push(" AND user_id = ")
            .push_bind(user.as_uuid());

        if query.build().execute(&mut *tx).await?.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: PAYMENT });
        }

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        Ok(view)
    }

    async fn delete_for_user(&self, user: UserId, id: PaymentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM medical_bill_payments WHERE id = ? AND user_id = ?")
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: PAYMENT });
        }
        debug!(payment = %id, user = %user, "Payment deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use medibills_types::Money;

    use super::*;
    use crate::test_support::{Fixture, date, new_bill};

    fn fifty_dollars() -> NewPayment {
        NewPayment {
            amount: Money::parse("50.00").unwrap(),
            date: date("2024-04-01"),
            notes: None,
            medical_bill_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_attach_then_detach_bill() {
        let fx = Fixture::new().await;
        let provider = fx.provider(fx.alice, "Clinic").await;
        let bill = fx.db.bills().create_for_user(fx.alice, new_bill(provider.id)).await.unwrap();
        let repo = fx.db.payments();
        let payment = repo.create_for_user(fx.alice, fifty_dollars()).await.unwrap();
        assert!(payment.medical_bills.is_empty());

        let attached = repo.attach_bills(fx.alice, payment.payment.id, &[bill.bill.id]).await.unwrap();
        let ids: Vec<_> = attached.medical_bills.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![bill.bill.id]);

        repo.detach_bill(fx.alice, payment.payment.id, bill.bill.id).await.unwrap();
        let after = repo.get_for_user(fx.alice, payment.payment.id).await.unwrap();
        assert!(after.medical_bills.is_empty());
    }

    #[tokio::test]
    async fn test_attach_twice_keeps_one_row() {
        let fx = Fixture::new().await;
        let provider = fx.provider(fx.alice, "Clinic").await;
        let bill = fx.db.bills().create_for_user(fx.alice, new_bill(provider.id)).await.unwrap();
        let repo = fx.db.payments();
        let payment = repo.create_for_user(fx.alice, fifty_dollars()).await.unwrap();

        repo.attach_bills(fx.alice, payment.payment.id, &[bill.bill.id]).await.unwrap();
        repo.attach_bills(fx.alice, payment.payment.id, &[bill.bill.id, bill.bill.id]).await.unwrap();
        assert_eq!(
            fx.db.row_count(crate::Table::MedicalBillPaymentAssociations).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_create_with_foreign_bill_persists_nothing() {
        let fx = Fixture::new().await;
        let theirs = fx.provider(fx.bob, "Theirs").await;
        let foreign = fx.db.bills().create_for_user(fx.bob, new_bill(theirs.id)).await.unwrap();

        let mut input = fifty_dollars();
        input.medical_bill_ids = vec![foreign.bill.id];
        let err = fx.db.payments().create_for_user(fx.alice, input).await.unwrap_err();

        assert_eq!(err.to_string(), "One or more medical bills not found");
        assert_eq!(fx.db.row_count(crate::Table::MedicalBillPayments).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_patch_clears_notes() {
        let fx = Fixture::new().await;
        let mut input = fifty_dollars();
        input.notes = Some("check #1024".into());
        let payment = fx.db.payments().create_for_user(fx.alice, input).await.unwrap();

        let patch = PaymentPatch { notes: Some(None), ..PaymentPatch::default() };
        let updated =
            fx.db.payments().update_for_user(fx.alice, payment.payment.id, patch).await.unwrap();
        assert_eq!(updated.payment.notes, None);
        assert_eq!(updated.payment.amount.cents(), 5_000);
    }
}
