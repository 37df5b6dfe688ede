//! `/api/medical-bills`, plus the bill side of the service-event links.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use medibills_store::{BillRepository, Database};
use medibills_types::{
    ProviderId, ServiceEventId, ServiceEventView,
    inputs::{BillPatch, NewBill},
};

use super::crud::{self, Resource, resource_id};
use crate::{
    envelope::Envelope,
    error::ApiResult,
    extract::{JsonBody, path_id},
    fields::{self, Field, Fields, date, money},
    middleware::RequireAuth,
    state::AppState,
};

const MEDICAL_PROVIDER_ID: Field =
    Field::new("medicalProviderId", "Medical provider ID must be a valid UUID");
const DATE_OF_SERVICE: Field = Field::new("dateOfService", "Date of service must be a valid date");
const TOTAL: Field = Field::new("total", "Total must be a positive number");
const SERVICE_EVENT_IDS: Field =
    Field::new("medicalServiceEventIds", "Medical service event IDs must be an array");

pub(crate) struct Bills;

impl Resource for Bills {
    type Repo = BillRepository;

    const INVALID_ID: &'static str = "Invalid bill ID";

    fn repository(db: &Database) -> Self::Repo {
        db.bills()
    }

    fn parse_new(mut fields: Fields) -> ApiResult<NewBill> {
        let medical_provider_id = fields.required(&MEDICAL_PROVIDER_ID, fields::id::<ProviderId>);
        let date_of_service = fields.required(&DATE_OF_SERVICE, date);
        let total = fields.required(&TOTAL, money);
        let input = match (medical_provider_id, date_of_service, total) {
            (Some(medical_provider_id), Some(date_of_service), Some(total)) => {
                Some(NewBill { medical_provider_id, date_of_service, total })
            },
            _ => None,
        };
        fields.finish(input)
    }

    fn parse_patch(mut fields: Fields) -> ApiResult<BillPatch> {
        let patch = BillPatch {
            medical_provider_id: fields.patch(&MEDICAL_PROVIDER_ID, fields::id::<ProviderId>),
            date_of_service: fields.patch(&DATE_OF_SERVICE, date),
            total: fields.patch(&TOTAL, money),
        };
        fields.finish(Some(patch))
    }
}

pub(crate) fn router() -> Router<AppState> {
    crud::routes::<Bills>()
        .route("/:id/service-events", get(list_service_events).post(attach_service_events))
        .route("/:id/service-events/:event_id", delete(detach_service_event))
}

async fn list_service_events(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(raw): Path<String>,
) -> ApiResult<Json<Envelope<Vec<ServiceEventView>>>> {
    let bill = resource_id::<Bills>(&raw)?;
    let events = state.db.bills().service_events(user, bill).await?;
    Ok(Json(Envelope::data(events)))
}

async fn attach_service_events(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(raw): Path<String>,
    JsonBody(mut fields): JsonBody,
) -> ApiResult<Json<Envelope<Vec<ServiceEventView>>>> {
    let bill = resource_id::<Bills>(&raw)?;
    let ids = fields.ids::<ServiceEventId>(
        &SERVICE_EVENT_IDS,
        "Each medical service event ID must be a valid UUID",
        true,
    );
    let ids = fields.finish(ids)?;
    let events = state.db.bills().attach_service_events(user, bill, &ids).await?;
    Ok(Json(
        Envelope::data(events).with_message("Medical service events added to bill successfully"),
    ))
}

async fn detach_service_event(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((raw_bill, raw_event)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<()>>> {
    let bill = resource_id::<Bills>(&raw_bill)?;
    let event = path_id("eventId", &raw_event, "Invalid service event ID")?;
    state.db.bills().detach_service_event(user, bill, event).await?;
    Ok(Json(Envelope::message("Medical service event removed from bill successfully")))
}
