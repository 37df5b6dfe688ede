//! Medical provider repository.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medibills_types::{
    MedicalProvider, ProviderId, ProviderSummary, UserId,
    inputs::{NewProvider, ProviderPatch},
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Result, StoreError},
    ownership::PROVIDER,
    repository::{OwnedRepository, begin_write, now, push_id_list},
};

#[derive(Debug, sqlx::FromRow)]
struct ProviderRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    address: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    payment_website: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProviderRow> for MedicalProvider {
    fn from(row: ProviderRow) -> Self {
        Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            name: row.name,
            address: row.address,
            phone: row.phone,
            website: row.website,
            payment_website: row.payment_website,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_PROVIDER: &str = "SELECT id, user_id, name, address, phone, website, payment_website, \
     created_at, updated_at FROM medical_providers";

/// Providers owned by a user. Providers embed no related data.
#[derive(Debug, Clone)]
pub struct ProviderRepository {
    pool: SqlitePool,
}

impl ProviderRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut SqliteConnection, user: UserId, id: ProviderId) -> Result<MedicalProvider> {
        let sql = format!("{SELECT_PROVIDER} WHERE id = ? AND user_id = ?");
        let row: Option<ProviderRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        row.map(MedicalProvider::from).ok_or(StoreError::NotFound { entity: PROVIDER })
    }
}

/// Loads `(id, name)` for every provider in `ids`.
pub(crate) async fn provider_summaries(
    conn: &mut SqliteConnection,
    ids: impl IntoIterator<Item = ProviderId>,
) -> Result<HashMap<ProviderId, ProviderSummary>> {
    let ids: BTreeSet<Uuid> = ids.into_iter().map(ProviderId::as_uuid).collect();
    let mut out = HashMap::with_capacity(ids.len());
    if ids.is_empty() {
        return Ok(out);
    }

    let mut query: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new("SELECT id, name FROM medical_providers WHERE id IN ");
    push_id_list(&mut query, ids.iter().copied());

    let rows: Vec<(Uuid, String)> = query.build_query_as().fetch_all(&mut *conn).await?;
    for (id, name) in rows {
        let id = ProviderId::from_uuid(id);
        out.insert(id, ProviderSummary { id, name });
    }
    Ok(out)
}

/// Resolves a provider summary previously loaded by [`provider_summaries`].
///
/// A miss means the foreign key pointed nowhere, which the schema forbids.
pub(crate) fn summary_for(
    summaries: &HashMap<ProviderId, ProviderSummary>,
    id: ProviderId,
) -> Result<ProviderSummary> {
    summaries.get(&id).cloned().ok_or(StoreError::NotFound { entity: PROVIDER })
}

#[async_trait]
impl OwnedRepository for ProviderRepository {
    type Id = ProviderId;
    type New = NewProvider;
    type Patch = ProviderPatch;
    type View = MedicalProvider;

    const ENTITY: &'static str = PROVIDER;

    async fn list_for_user(&self, user: UserId) -> Result<Vec<MedicalProvider>> {
        let sql = format!("{SELECT_PROVIDER} WHERE user_id = ? ORDER BY created_at DESC, rowid DESC");
        let rows: Vec<ProviderRow> =
            sqlx::query_as(&sql).bind(user.as_uuid()).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(MedicalProvider::from).collect())
    }

    async fn get_for_user(&self, user: UserId, id: ProviderId) -> Result<MedicalProvider> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, user, id).await
    }

    async fn create_for_user(&self, user: UserId, input: NewProvider) -> Result<MedicalProvider> {
        let id = ProviderId::generate();
        let at = now();
        sqlx::query(
            "INSERT INTO medical_providers (id, user_id, name, address, phone, website, \
             payment_website, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.website)
        .bind(&input.payment_website)
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await?;

        debug!(provider = %id, user = %user, "Provider created");
        Ok(MedicalProvider {
            id,
            user_id: user,
            name: input.name,
            address: input.address,
            phone: input.phone,
            website: input.website,
            payment_website: input.payment_website,
            created_at: at,
            updated_at: at,
        })
    }

    async fn update_for_user(
        &self,
        user: UserId,
        id: ProviderId,
        patch: ProviderPatch,
    ) -> Result<MedicalProvider> {
        let mut tx = begin_write(&self.pool).await?;

        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE medical_providers SET updated_at = ");
        query.push_bind(now());
        if let Some(name) = patch.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(address) = patch.address {
            query.push(", address = ").push_bind(address);
        }
        if let Some(phone) = patch.phone {
            query.push(", phone = ").push_bind(phone);
        }
        if let Some(website) = patch.website {
            query.push(", website = ").push_bind(website);
        }
        if let Some(payment_website) = patch.payment_website {
            query.push(", payment_website = ").push_bind(payment_website);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id.as_uuid())
            .push(" AND user_id = ")
            .push_bind(user.as_uuid());

        let result = query.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: PROVIDER });
        }

        let provider = Self::fetch(&mut tx, user, id).await?;
        tx.commit().await?;
        Ok(provider)
    }

    async fn delete_for_user(&self, user: UserId, id: ProviderId) -> Result<()> {
        let result = sqlx::query("DELETE FROM medical_providers WHERE id = ? AND user_id = ?")
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict { .. } => StoreError::Conflict {
                    message: "Cannot delete medical provider while other records reference it"
                        .to_string(),
                },
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: PROVIDER });
        }
        debug!(provider = %id, user = %user, "Provider deleted");
        Ok(())
    }
}
