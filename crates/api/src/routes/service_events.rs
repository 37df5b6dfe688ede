//! `/api/medical-service-events`, plus the event side of the bill links.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, post},
};
use medibills_store::{Database, ServiceEventRepository};
use medibills_types::{
    BillId, EobId, ProviderId, ServiceEventView,
    inputs::{NewServiceEvent, ServiceEventPatch},
    validation::TEXT_MAX_CHARS,
};

use super::{
    BILL_IDS, EACH_BILL_ID,
    crud::{self, Resource, resource_id},
};
use crate::{
    envelope::Envelope,
    error::ApiResult,
    extract::{JsonBody, path_id},
    fields::{self, Field, Fields, date, money, text},
    middleware::RequireAuth,
    state::AppState,
};

const MEDICAL_PROVIDER_ID: Field =
    Field::new("medicalProviderId", "Medical provider ID must be a valid UUID");
const MEDICAL_BILL_ID: Field =
    Field::new("medicalBillId", "Medical bill ID must be a valid UUID");
const EOB_ID: Field =
    Field::new("explanationOfBenefitsId", "Explanation of benefits ID must be a valid UUID");
const DATE_OF_SERVICE: Field = Field::new("dateOfService", "Date of service must be a valid date");
const DESCRIPTION: Field =
    Field::new("description", "Description must be less than 1000 characters");
const AMOUNT: Field = Field::new("amount", "Amount must be a positive number");

pub(crate) struct ServiceEvents;

impl Resource for ServiceEvents {
    type Repo = ServiceEventRepository;

    const INVALID_ID: &'static str = "Invalid service event ID";

    fn repository(db: &Database) -> Self::Repo {
        db.service_events()
    }

    /// Bills may be linked at creation through `medicalBillIds`, or the
    /// single `medicalBillId` older clients send.
    fn parse_new(mut fields: Fields) -> ApiResult<NewServiceEvent> {
        let medical_provider_id = fields.required(&MEDICAL_PROVIDER_ID, fields::id::<ProviderId>);
        let explanation_of_benefits_id = fields.optional(&EOB_ID, fields::id::<EobId>);
        let date_of_service = fields.required(&DATE_OF_SERVICE, date);
        let description = fields.optional(&DESCRIPTION, text(0, TEXT_MAX_CHARS));
        let amount = fields.optional(&AMOUNT, money);
        let single_bill = fields.optional(&MEDICAL_BILL_ID, fields::id::<BillId>);
        let medical_bill_ids = fields.ids::<BillId>(&BILL_IDS, EACH_BILL_ID, false).map(|mut ids| {
            if let Some(bill) = single_bill.filter(|bill| !ids.contains(bill)) {
                ids.push(bill);
            }
            ids
        });

        let input = match (medical_provider_id, date_of_service, medical_bill_ids) {
            (Some(medical_provider_id), Some(date_of_service), Some(medical_bill_ids)) => {
                Some(NewServiceEvent {
                    medical_provider_id,
                    explanation_of_benefits_id,
                    date_of_service,
                    description,
                    amount,
                    medical_bill_ids,
                })
            },
            _ => None,
        };
        fields.finish(input)
    }

    fn parse_patch(mut fields: Fields) -> ApiResult<ServiceEventPatch> {
        let patch = ServiceEventPatch {
            medical_provider_id: fields.patch(&MEDICAL_PROVIDER_ID, fields::id::<ProviderId>),
            explanation_of_benefits_id: fields.nullable(&EOB_ID, fields::id::<EobId>),
            date_of_service: fields.patch(&DATE_OF_SERVICE, date),
            description: fields.nullable(&DESCRIPTION, text(0, TEXT_MAX_CHARS)),
            amount: fields.nullable(&AMOUNT, money),
        };
        fields.finish(Some(patch))
    }
}

pub(crate) fn router() -> Router<AppState> {
    crud::routes::<ServiceEvents>()
        .route("/:id/medical-bills", post(attach_bills))
        .route("/:id/medical-bills/:bill_id", delete(detach_bill))
}

async fn attach_bills(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(raw): Path<String>,
    JsonBody(mut fields): JsonBody,
) -> ApiResult<Json<Envelope<ServiceEventView>>> {
    let event = resource_id::<ServiceEvents>(&raw)?;
    let ids = fields.ids::<BillId>(&BILL_IDS, EACH_BILL_ID, true);
    let ids = fields.finish(ids)?;
    let view = state.db.service_events().attach_bills(user, event, &ids).await?;
    Ok(Json(Envelope::data(view).with_message("Medical bills added to service event successfully")))
}

async fn detach_bill(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((raw_event, raw_bill)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<()>>> {
    let event = resource_id::<ServiceEvents>(&raw_event)?;
    let bill = path_id("billId", &raw_bill, "Invalid medical bill ID")?;
    state.db.service_events().detach_bill(user, event, bill).await?;
    Ok(Json(Envelope::message("Medical bill removed from service event successfully")))
}
