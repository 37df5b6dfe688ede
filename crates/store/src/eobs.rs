//! Explanation of benefits repository.
//!
//! Deleting an EOB leaves referencing service events in place with their
//! `explanation_of_benefits_id` cleared (`ON DELETE SET NULL`).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medibills_types::{
    EobId, EobView, ExplanationOfBenefits, UserId,
    inputs::{EobPatch, NewEob},
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Result, StoreError},
    ownership,
    ownership::EOB,
    providers::{provider_summaries, summary_for},
    repository::{OwnedRepository, begin_write, money, now},
};

#[derive(Debug, sqlx::FromRow)]
struct EobRow {
    id: Uuid,
    user_id: Uuid,
    medical_provider_id: Uuid,
    date_of_service: NaiveDate,
    total_paid: i64,
    total_billed: i64,
    total_discount: i64,
    total_may_owe: i64,
    insurer: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EobRow> for ExplanationOfBenefits {
    type Error = StoreError;

    fn try_from(row: EobRow) -> Result<Self> {
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            medical_provider_id: row.medical_provider_id.into(),
            date_of_service: row.date_of_service,
            total_paid: money("total_paid", row.total_paid)?,
            total_billed: money("total_billed", row.total_billed)?,
            total_discount: money("total_discount", row.total_discount)?,
            total_may_owe: money("total_may_owe", row.total_may_owe)?,
            insurer: row.insurer,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_EOB: &str = "SELECT id, user_id, medical_provider_id, date_of_service, total_paid, \
     total_billed, total_discount, total_may_owe, insurer, created_at, updated_at \
     FROM explanation_of_benefits";

async fn expand(conn: &mut SqliteConnection, rows: Vec<EobRow>) -> Result<Vec<EobView>> {
    let eobs = rows.into_iter().map(ExplanationOfBenefits::try_from).collect::<Result<Vec<_>>>()?;
    let providers = provider_summaries(conn, eobs.iter().map(|e| e.medical_provider_id)).await?;
    eobs.into_iter()
        .map(|eob| {
            let medical_provider = summary_for(&providers, eob.medical_provider_id)?;
            Ok(EobView { eob, medical_provider })
        })
        .collect()
}

/// EOBs owned by a user.
#[derive(Debug, Clone)]
pub struct EobRepository {
    pool: SqlitePool,
}

impl EobRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut SqliteConnection, user: UserId, id: EobId) -> Result<EobView> {
        let sql = format!("{SELECT_EOB} WHERE id = ? AND user_id = ?");
        let row: Option<EobRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        let row = row.ok_or(StoreError::NotFound { entity: EOB })?;
        expand(conn, vec![row]).await?.pop().ok_or(StoreError::NotFound { entity: EOB })
    }
}

#[async_trait]
impl OwnedRepository for EobRepository {
    type Id = EobId;
    type New = NewEob;
    type Patch = EobPatch;
    type View = EobView;

    const ENTITY: &'static str = EOB;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<EobView>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{SELECT_EOB} WHERE user_id = ? ORDER BY created_at DESC, rowid DESC");
        let rows: Vec<EobRow> =
            sqlx::query_as(&sql).bind(user.as_uuid()).fetch_all(&mut *conn).await?;
        expand(&mut conn, rows).await
    }

    async fn get_for_user(&self, user: UserId, id: EobId) -> Result<EobView> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, user, id).await
    }

    async fn create_for_user(&self, user: UserId, input: NewEob) -> Result<EobView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_provider(&mut tx, user, input.medical_provider_id).await?;

        let id = EobId::generate();
        let at = now();
        sqlx::query(
            "INSERT INTO explanation_of_benefits (id, user_id, medical_provider_id, \
             date_of_service, total_paid, total_billed, total_discount, total_may_owe, insurer, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .bind(input.medical_provider_id.as_uuid())
        .bind(input.date_of_service)
        .bind(input.total_paid.cents())
        .bind(input.total_billed.cents())
        .bind(input.total_discount.cents())
        .bind(input.total_may_owe.cents())
        .bind(&input.insurer)
        .bind(at)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        debug!(eob = %id, user = %user, "Explanation of benefits created");
        Ok(view)
    }

    async fn update_for_user(&self, user: UserId, id: EobId, patch: EobPatch) -> Result<EobView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_eob(&mut tx, user, id).await?;
        if let Some(provider) = patch.medical_provider_id {
            ownership::ensure_provider(&mut tx, user, provider).await?;
        }

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE explanation_of_benefits SET updated_at = ");
        query.push_bind(now());
        if let Some(provider) = patch.medical_provider_id {
            query.push(", medical_provider_id = ").push_bind(provider.as_uuid());
        }
        if let Some(date) = patch.date_of_service {
            query.push(", date_of_service = ").push_bind(date);
        }
        for (column, value) in [
            ("total_paid", patch.total_paid),
            ("total_billed", patch.total_billed),
            ("total_discount", patch.total_discount),
            ("total_may_owe", patch.total_may_owe),
        ] {
            if let Some(value) = value {
                query.push(format!(", {column} = ")).push_bind(value.cents());
            }
        }
        if let Some(insurer) = patch.insurer {
            query.push(", insurer = ").push_bind(insurer);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id.as_uuid())
            .push(" AND user_id = ")
            .push_bind(user.as_uuid());

        if query.build().execute(&mut *tx).await?.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: EOB });
        }

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        Ok(view)
    }

    async fn delete_for_user(&self, user: UserId, id: EobId) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM explanation_of_benefits WHERE id = ? AND user_id = ?")
                .bind(id.as_uuid())
                .bind(user.as_uuid())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: EOB });
        }
        debug!(eob = %id, user = %user, "Explanation of benefits deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use medibills_types::Money;

    use super::*;
    use crate::test_support::{Fixture, new_eob, new_event};

    #[tokio::test]
    async fn test_create_embeds_provider() {
        let fx = Fixture::new().await;
        let provider = fx.provider(fx.alice, "Clinic").await;
        let eob = fx.db.eobs().create_for_user(fx.alice, new_eob(provider.id)).await.unwrap();
        assert_eq!(eob.medical_provider.name, "Clinic");
        assert_eq!(eob.eob.total_discount, Money::ZERO);
    }

    #[tokio::test]
    async fn test_patch_updates_only_supplied_totals() {
        let fx = Fixture::new().await;
        let provider = fx.provider(fx.alice, "Clinic").await;
        let eob = fx.db.eobs().create_for_user(fx.alice, new_eob(provider.id)).await.unwrap();

        let patch = EobPatch {
            total_may_owe: Some(Money::from_cents(999).unwrap()),
            ..EobPatch::default()
        };
        let updated = fx.db.eobs().update_for_user(fx.alice, eob.eob.id, patch).await.unwrap();
        assert_eq!(updated.eob.total_may_owe.cents(), 999);
        assert_eq!(updated.eob.total_paid, eob.eob.total_paid);
        assert_eq!(updated.eob.insurer, eob.eob.insurer);
    }

    #[tokio::test]
    async fn test_delete_nulls_service_event_reference() {
        let fx = Fixture::new().await;
        let provider = fx.provider(fx.alice, "Clinic").await;
        let eob = fx.db.eobs().create_for_user(fx.alice, new_eob(provider.id)).await.unwrap();
        let mut input = new_event(provider.id);
        input.explanation_of_benefits_id = Some(eob.eob.id);
        let event = fx.db.service_events().create_for_user(fx.alice, input).await.unwrap();

        fx.db.eobs().delete_for_user(fx.alice, eob.eob.id).await.unwrap();

        let after = fx.db.service_events().get_for_user(fx.alice, event.event.id).await.unwrap();
        assert_eq!(after.event.explanation_of_benefits_id, None);
        assert!(after.explanation_of_benefits.is_none());
    }
}
