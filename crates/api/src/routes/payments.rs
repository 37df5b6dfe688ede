//! `/api/medical-bill-payments`, plus the bills each payment covers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, post},
};
use medibills_store::{Database, PaymentRepository};
use medibills_types::{
    BillId, PaymentView,
    inputs::{NewPayment, PaymentPatch},
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
    fields::{Field, Fields, date, money, text},
    middleware::RequireAuth,
    state::AppState,
};

const AMOUNT: Field = Field::new("amount", "Amount must be a positive number");
const DATE: Field = Field::new("date", "Date must be a valid date");
const NOTES: Field = Field::new("notes", "Notes must be less than 1000 characters");

pub(crate) struct Payments;

impl Resource for Payments {
    type Repo = PaymentRepository;

    const INVALID_ID: &'static str = "Invalid payment ID";

    fn repository(db: &Database) -> Self::Repo {
        db.payments()
    }

    fn parse_new(mut fields: Fields) -> ApiResult<NewPayment> {
        let amount = fields.required(&AMOUNT, money);
        let date = fields.required(&DATE, date);
        let notes = fields.optional(&NOTES, text(0, TEXT_MAX_CHARS));
        let medical_bill_ids = fields.ids::<BillId>(&BILL_IDS, EACH_BILL_ID, false);

        let input = match (amount, date, medical_bill_ids) {
            (Some(amount), Some(date), Some(medical_bill_ids)) => {
                Some(NewPayment { amount, date, notes, medical_bill_ids })
            },
            _ => None,
        };
        fields.finish(input)
    }

    fn parse_patch(mut fields: Fields) -> ApiResult<PaymentPatch> {
        let patch = PaymentPatch {
            amount: fields.patch(&AMOUNT, money),
            date: fields.patch(&DATE, date),
            notes: fields.nullable(&NOTES, text(0, TEXT_MAX_CHARS)),
        };
        fields.finish(Some(patch))
    }
}

pub(crate) fn router() -> Router<AppState> {
    crud::routes::<Payments>()
        .route("/:id/medical-bills", post(attach_bills))
        .route("/:id/medical-bills/:bill_id", delete(detach_bill))
}

async fn attach_bills(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(raw): Path<String>,
    JsonBody(mut fields): JsonBody,
) -> ApiResult<Json<Envelope<PaymentView>>> {
    let payment = resource_id::<Payments>(&raw)?;
    let ids = fields.ids::<BillId>(&BILL_IDS, EACH_BILL_ID, true);
    let ids = fields.finish(ids)?;
    let view = state.db.payments().attach_bills(user, payment, &ids).await?;
    Ok(Json(Envelope::data(view).with_message("Medical bills added to payment successfully")))
}

async fn detach_bill(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((raw_payment, raw_bill)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<()>>> {
    let payment = resource_id::<Payments>(&raw_payment)?;
    let bill = path_id("billId", &raw_bill, "Invalid medical bill ID")?;
    state.db.payments().detach_bill(user, payment, bill).await?;
    Ok(Json(Envelope::message("Medical bill removed from payment successfully")))
}
