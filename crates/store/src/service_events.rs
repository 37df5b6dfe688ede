//! Medical service event repository.
//!
//! Events embed their provider, their EOB (if any), and every linked bill.
//! Expansion is three bounded `IN`-list queries regardless of how many
//! events are returned.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medibills_types::{
    BillId, EobId, EobSummary, MedicalServiceEvent, ServiceEventId, ServiceEventView, UserId,
    inputs::{NewServiceEvent, ServiceEventPatch},
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Result, StoreError},
    links, ownership,
    ownership::SERVICE_EVENT,
    providers::{provider_summaries, summary_for},
    repository::{OwnedRepository, begin_write, now, optional_money, push_id_list},
};

#[derive(Debug, sqlx::FromRow)]
struct ServiceEventRow {
    id: Uuid,
    user_id: Uuid,
    medical_provider_id: Uuid,
    explanation_of_benefits_id: Option<Uuid>,
    date_of_service: NaiveDate,
    description: Option<String>,
    amount: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ServiceEventRow> for MedicalServiceEvent {
    type Error = StoreError;

    fn try_from(row: ServiceEventRow) -> Result<Self> {
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            medical_provider_id: row.medical_provider_id.into(),
            explanation_of_benefits_id: row.explanation_of_benefits_id.map(EobId::from_uuid),
            date_of_service: row.date_of_service,
            description: row.description,
            amount: optional_money("amount", row.amount)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_EVENT: &str = "SELECT e.id, e.user_id, e.medical_provider_id, \
     e.explanation_of_benefits_id, e.date_of_service, e.description, e.amount, e.created_at, \
     e.updated_at FROM medical_service_events e";

async fn eob_summaries(
    conn: &mut SqliteConnection,
    ids: BTreeSet<Uuid>,
) -> Result<HashMap<EobId, EobSummary>> {
    let mut out = HashMap::with_capacity(ids.len());
    if ids.is_empty() {
        return Ok(out);
    }

    let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
        "SELECT id, insurer, date_of_service FROM explanation_of_benefits WHERE id IN ",
    );
    push_id_list(&mut query, ids);

    let rows: Vec<(Uuid, String, NaiveDate)> = query.build_query_as().fetch_all(&mut *conn).await?;
    for (id, insurer, date_of_service) in rows {
        let id = EobId::from_uuid(id);
        out.insert(id, EobSummary { id, insurer, date_of_service });
    }
    Ok(out)
}

async fn expand(
    conn: &mut SqliteConnection,
    rows: Vec<ServiceEventRow>,
) -> Result<Vec<ServiceEventView>> {
    let events =
        rows.into_iter().map(MedicalServiceEvent::try_from).collect::<Result<Vec<_>>>()?;

    let providers = provider_summaries(&mut *conn, events.iter().map(|e| e.medical_provider_id)).await?;
    let eob_ids = events
        .iter()
        .filter_map(|e| e.explanation_of_benefits_id.map(EobId::as_uuid))
        .collect();
    let eobs = eob_summaries(&mut *conn, eob_ids).await?;
    let mut bills = links::bills_for_events(&mut *conn, events.iter().map(|e| e.id)).await?;

    events
        .into_iter()
        .map(|event| {
            let medical_provider = summary_for(&providers, event.medical_provider_id)?;
            let explanation_of_benefits =
                event.explanation_of_benefits_id.and_then(|id| eobs.get(&id).cloned());
            let medical_bills = bills.remove(&event.id).unwrap_or_default();
            Ok(ServiceEventView { event, medical_provider, explanation_of_benefits, medical_bills })
        })
        .collect()
}

/// Events linked to `bill`, expanded. The caller has already gated the bill.
pub(crate) async fn linked_to_bill(
    conn: &mut SqliteConnection,
    user: UserId,
    bill: BillId,
) -> Result<Vec<ServiceEventView>> {
    let sql = format!(
        "{SELECT_EVENT} JOIN medical_bill_service_events l ON l.medical_service_event_id = e.id \
         WHERE l.medical_bill_id = ? AND e.user_id = ? \
         ORDER BY e.date_of_service DESC, e.created_at DESC"
    );
    let rows: Vec<ServiceEventRow> = sqlx::query_as(&sql)
        .bind(bill.as_uuid())
        .bind(user.as_uuid())
        .fetch_all(&mut *conn)
        .await?;
    expand(conn, rows).await
}

/// Service events owned by a user.
#[derive(Debug, Clone)]
pub struct ServiceEventRepository {
    pool: SqlitePool,
}

impl ServiceEventRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(
        conn: &mut SqliteConnection,
        user: UserId,
        id: ServiceEventId,
    ) -> Result<ServiceEventView> {
        let sql = format!("{SELECT_EVENT} WHERE e.id = ? AND e.user_id = ?");
        let row: Option<ServiceEventRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        let row = row.ok_or(StoreError::NotFound { entity: SERVICE_EVENT })?;
        expand(conn, vec![row]).await?.pop().ok_or(StoreError::NotFound { entity: SERVICE_EVENT })
    }

    /// Links every bill in `bills` to the event. Existing links are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the event or any bill is not owned
    /// by `user`; nothing is linked in that case.
    pub async fn attach_bills(
        &self,
        user: UserId,
        event: ServiceEventId,
        bills: &[BillId],
    ) -> Result<ServiceEventView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_service_event(&mut tx, user, event).await?;
        ownership::ensure_bills(&mut tx, user, bills).await?;
        let added = links::link_bills_to_event(&mut tx, event, bills).await?;
        let view = Self::fetch(&mut tx, user, event).await?;
        tx.commit().await?;
        debug!(event = %event, added, "Bills attached to service event");
        Ok(view)
    }

    /// Removes the link between the event and `bill`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if either side is not owned by `user`.
    pub async fn detach_bill(&self, user: UserId, event: ServiceEventId, bill: BillId) -> Result<()> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_service_event(&mut tx, user, event).await?;
        ownership::ensure_bill(&mut tx, user, bill).await?;
        let removed = links::unlink_bill_from_event(&mut tx, event, bill).await?;
        tx.commit().await?;
        debug!(event = %event, bill = %bill, removed, "Bill detached from service event");
        Ok(())
    }
}

#[async_trait]
impl OwnedRepository for ServiceEventRepository {
    type Id = ServiceEventId;
    type New = NewServiceEvent;
    type Patch = ServiceEventPatch;
    type View = ServiceEventView;

    const ENTITY: &'static str = SERVICE_EVENT;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<ServiceEventView>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "{SELECT_EVENT} WHERE e.user_id = ? ORDER BY e.created_at DESC, e.rowid DESC"
        );
        let rows: Vec<ServiceEventRow> =
            sqlx::query_as(&sql).bind(user.as_uuid()).fetch_all(&mut *conn).await?;
        expand(&mut conn, rows).await
    }

    async fn get_for_user(&self, user: UserId, id: ServiceEventId) -> Result<ServiceEventView> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, user, id).await
    }

    async fn create_for_user(
        &self,
        user: UserId,
        input: NewServiceEvent,
    ) -> Result<ServiceEventView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_provider(&mut tx, user, input.medical_provider_id).await?;
        if let Some(eob) = input.explanation_of_benefits_id {
            ownership::ensure_eob(&mut tx, user, eob).await?;
        }
        ownership::ensure_bills(&mut tx, user, &input.medical_bill_ids).await?;

        let id = ServiceEventId::generate();
        let at = now();
        sqlx::query(
            "INSERT INTO medical_service_events (id, user_id, medical_provider_id, \
             explanation_of_benefits_id, date_of_service, description, amount, created_at, \
             updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .bind(input.medical_provider_id.as_uuid())
        .bind(input.explanation_of_benefits_id.map(EobId::as_uuid))
        .bind(input.date_of_service)
        .bind(&input.description)
        .bind(input.amount.map(|m| m.cents()))
        .bind(at)
        .bind(at)
        .execute(&mut *tx)
        .await?;
        links::link_bills_to_event(&mut tx, id, &input.medical_bill_ids).await?;

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        debug!(event = %id, user = %user, bills = view.medical_bills.len(), "Service event created");
        Ok(view)
    }

    async fn update_for_user(
        &self,
        user: UserId,
        id: ServiceEventId,
        patch: ServiceEventPatch,
    ) -> Result<ServiceEventView> {
        let mut tx = begin_write(&self.pool).await?;
        ownership::ensure_service_event(&mut tx, user, id).await?;
        if let Some(provider) = patch.medical_provider_id {
            ownership::ensure_provider(&mut tx, user, provider).await?;
        }
        if let Some(Some(eob)) = patch.explanation_of_benefits_id {
            ownership::ensure_eob(&mut tx, user, eob).await?;
        }

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE medical_service_events SET updated_at = ");
        query.push_bind(now());
        if let Some(provider) = patch.medical_provider_id {
            query.push(", medical_provider_id = ").push_bind(provider.as_uuid());
        }
        if let Some(eob) = patch.explanation_of_benefits_id {
            query.push(", explanation_of_benefits_id = ").push_bind(eob.map(EobId::as_uuid));
        }
        if let Some(date) = patch.date_of_service {
            query.push(", date_of_service = ").push_bind(date);
        }
        if let Some(description) = patch.description {
            query.push(", description = ").push_bind(description);
        }
        if let Some(amount) = patch.amount {
            query.push(", amount = ").push_bind(amount.map(|m| m.cents()));
        }
        query
            .push(" WHERE id = ")
            .push_bind(id.as_uuid())
            .push(" AND user_id = ")
            .push_bind(user.as_uuid());

        if query.build().execute(&mut *tx).await?.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: SERVICE_EVENT });
        }

        let view = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        Ok(view)
    }

    async fn delete_for_user(&self, user: UserId, id: ServiceEventId) -> Result<()> {
        let result = sqlx::query("DELETE FROM medical_service_events WHERE id = ? AND user_id = ?")
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: SERVICE_EVENT });
        }
        debug!(event = %id, user = %user, "Service event deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, new_bill, new_eob, new_event};

    #[tokio::test]
    async fn test_create_links_bills_in_same_call() {
        let fx = Fixture::new().await;
        let provider = fx.provider(fx.alice, "Lab").await;
        let bill = fx.db.bills().create_for_user(fx.alice, new_bill(provider.id)).await.unwrap();

        let mut input = new_event(provider.id);
        input.medical_bill_ids = vec![bill.bill.id, bill.bill.id];
        let created = fx.db.service_events().create_for_user(fx.alice, input).await.unwrap();

        assert_eq!(created.medical_bills.len(), 1);
        assert_eq!(created.medical_bills[0].id, bill.bill.id);
        assert_eq!(created.medical_provider.name, "Lab");
    }

    #[tokio::test]
    async fn test_create_with_foreign_eob_persists_nothing() {
        let fx = Fixture::new().await;
        let mine = fx.provider(fx.alice, "Mine").await;
        let theirs = fx.provider(fx.bob, "Theirs").await;
        let eob = fx.db.eobs().create_for_user(fx.bob, new_eob(theirs.id)).await.unwrap();

        let mut input = new_event(mine.id);
        input.explanation_of_benefits_id = Some(eob.eob.id);
        let err = fx.db.service_events().create_for_user(fx.alice, input).await.unwrap_err();

        assert_eq!(err.to_string(), "Explanation of benefits not found");
        assert_eq!(fx.db.row_count(crate::Table::MedicalServiceEvents).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_patch_clears_eob_and_amount() {
        let fx = Fixture::new().await;
        let provider = fx.provider(fx.alice, "Clinic").await;
        let eob = fx.db.eobs().create_for_user(fx.alice, new_eob(provider.id)).await.unwrap();
        let mut input = new_event(provider.id);
        input.explanation_of_benefits_id = Some(eob.eob.id);
        input.amount = Some(medibills_types::Money::from_cents(1_250).unwrap());
        let created = fx.db.service_events().create_for_user(fx.alice, input).await.unwrap();
        assert_eq!(created.explanation_of_benefits.as_ref().map(|e| e.id), Some(eob.eob.id));

        let patch = ServiceEventPatch {
            explanation_of_benefits_id: Some(None),
            amount: Some(None),
            ..ServiceEventPatch::default()
        };
        let updated =
            fx.db.service_events().update_for_user(fx.alice, created.event.id, patch).await.unwrap();
        assert_eq!(updated.event.explanation_of_benefits_id, None);
        assert!(updated.explanation_of_benefits.is_none());
        assert_eq!(updated.event.amount, None);
    }

    #[tokio::test]
    async fn test_attach_and_detach_bills() {
        let fx = Fixture::new().await;
        let provider = fx.provider(fx.alice, "Clinic").await;
        let bill = fx.db.bills().create_for_user(fx.alice, new_bill(provider.id)).await.unwrap();
        let event =
            fx.db.service_events().create_for_user(fx.alice, new_event(provider.id)).await.unwrap();
        let repo = fx.db.service_events();

        let attached = repo.attach_bills(fx.alice, event.event.id, &[bill.bill.id]).await.unwrap();
        assert_eq!(attached.medical_bills.len(), 1);

        repo.detach_bill(fx.alice, event.event.id, bill.bill.id).await.unwrap();
        let after = repo.get_for_user(fx.alice, event.event.id).await.unwrap();
        assert!(after.medical_bills.is_empty());

        // A second detach is still fine.
        repo.detach_bill(fx.alice, event.event.id, bill.bill.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_detach_requires_both_sides_owned() {
        let fx = Fixture::new().await;
        let mine = fx.provider(fx.alice, "Mine").await;
        let theirs = fx.provider(fx.bob, "Theirs").await;
        let event =
            fx.db.service_events().create_for_user(fx.alice, new_event(mine.id)).await.unwrap();
        let foreign_bill = fx.db.bills().create_for_user(fx.bob, new_bill(theirs.id)).await.unwrap();

        let err = fx
            .db
            .service_events()
            .detach_bill(fx.alice, event.event.id, foreign_bill.bill.id)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Medical bill not found");
    }
}
