//! The five CRUD endpoints, generic over an owned resource.
//!
//! Each resource module implements [`Resource`] with its body parsers and
//! mounts [`routes`] under its prefix:
//!
//! | Method | Path   | Success                                  |
//! |--------|--------|------------------------------------------|
//! | GET    | `/`    | 200, all rows owned by the caller        |
//! | POST   | `/`    | 201, `"<Entity> created successfully"`   |
//! | GET    | `/:id` | 200                                      |
//! | PUT    | `/:id` | 200, `"<Entity> updated successfully"`   |
//! | DELETE | `/:id` | 200, `"<Entity> deleted successfully"`   |

use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use medibills_store::{Database, OwnedRepository};
use serde::Serialize;
use tracing::info;

use crate::{
    envelope::Envelope,
    error::ApiResult,
    extract::{JsonBody, path_id},
    fields::Fields,
    middleware::RequireAuth,
    state::AppState,
};

/// An owned entity exposed over HTTP.
pub(crate) trait Resource: Send + Sync + 'static {
    /// Repository serving the entity.
    type Repo: OwnedRepository<Id: FromStr + std::fmt::Display, View: Serialize>;

    /// Message reported for a malformed `:id` segment.
    const INVALID_ID: &'static str;

    fn repository(db: &Database) -> Self::Repo;

    /// Validates a create body.
    fn parse_new(fields: Fields) -> ApiResult<NewOf<Self>>;

    /// Validates an update body. Absent fields stay unchanged.
    fn parse_patch(fields: Fields) -> ApiResult<PatchOf<Self>>;
}

pub(crate) type IdOf<R> = <<R as Resource>::Repo as OwnedRepository>::Id;
pub(crate) type NewOf<R> = <<R as Resource>::Repo as OwnedRepository>::New;
pub(crate) type PatchOf<R> = <<R as Resource>::Repo as OwnedRepository>::Patch;
pub(crate) type ViewOf<R> = <<R as Resource>::Repo as OwnedRepository>::View;

fn entity<R: Resource>() -> &'static str {
    <R::Repo as OwnedRepository>::ENTITY
}

/// Builds the CRUD router for `R`.
pub(crate) fn routes<R: Resource>() -> Router<AppState> {
    Router::new()
        .route("/", get(list::<R>).post(create::<R>))
        .route("/:id", get(show::<R>).put(update::<R>).delete(destroy::<R>))
}

/// Parses the `:id` segment for `R`.
pub(crate) fn resource_id<R: Resource>(raw: &str) -> ApiResult<IdOf<R>> {
    path_id("id", raw, R::INVALID_ID)
}

async fn list<R: Resource>(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<Json<Envelope<Vec<ViewOf<R>>>>> {
    let rows = R::repository(&state.db).list_for_user(user).await?;
    Ok(Json(Envelope::data(rows)))
}

async fn show<R: Resource>(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(raw): Path<String>,
) -> ApiResult<Json<Envelope<ViewOf<R>>>> {
    let id = resource_id::<R>(&raw)?;
    let row = R::repository(&state.db).get_for_user(user, id).await?;
    Ok(Json(Envelope::data(row)))
}

async fn create<R: Resource>(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(fields): JsonBody,
) -> ApiResult<(StatusCode, Json<Envelope<ViewOf<R>>>)> {
    let input = R::parse_new(fields)?;
    let row = R::repository(&state.db).create_for_user(user, input).await?;
    info!(user = %user, entity = entity::<R>(), "Record created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(row).with_message(format!("{} created successfully", entity::<R>()))),
    ))
}

async fn update<R: Resource>(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(raw): Path<String>,
    JsonBody(fields): JsonBody,
) -> ApiResult<Json<Envelope<ViewOf<R>>>> {
    let id = resource_id::<R>(&raw)?;
    let patch = R::parse_patch(fields)?;
    let row = R::repository(&state.db).update_for_user(user, id, patch).await?;
    info!(user = %user, id = %id, "Record updated");
    Ok(Json(Envelope::data(row).with_message(format!("{} updated successfully", entity::<R>()))))
}

async fn destroy<R: Resource>(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(raw): Path<String>,
) -> ApiResult<Json<Envelope<()>>> {
    let id = resource_id::<R>(&raw)?;
    R::repository(&state.db).delete_for_user(user, id).await?;
    info!(user = %user, id = %id, "Record deleted");
    Ok(Json(Envelope::message(format!("{} deleted successfully", entity::<R>()))))
}
