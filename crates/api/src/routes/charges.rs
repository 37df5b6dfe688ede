//! `/api/medical-bill-charges`

use axum::Router;
use medibills_store::{ChargeRepository, Database};
use medibills_types::{
    BillId,
    inputs::{ChargePatch, NewCharge},
    validation::TEXT_MAX_CHARS,
};

use super::crud::{self, Resource};
use crate::{
    error::ApiResult,
    fields::{self, Field, Fields, money, text},
    state::AppState,
};

const MEDICAL_BILL_ID: Field =
    Field::new("medicalBillId", "Medical bill ID must be a valid UUID");
const AMOUNT: Field = Field::new("amount", "Amount must be a positive number");
const DESCRIPTION: Field =
    Field::new("description", "Description must be less than 1000 characters");

pub(crate) struct Charges;

impl Resource for Charges {
    type Repo = ChargeRepository;

    const INVALID_ID: &'static str = "Invalid charge ID";

    fn repository(db: &Database) -> Self::Repo {
        db.charges()
    }

    fn parse_new(mut fields: Fields) -> ApiResult<NewCharge> {
        let medical_bill_id = fields.required(&MEDICAL_BILL_ID, fields::id::<BillId>);
        let amount = fields.required(&AMOUNT, money);
        let description = fields.optional(&DESCRIPTION, text(0, TEXT_MAX_CHARS));
        let input = medical_bill_id
            .zip(amount)
            .map(|(medical_bill_id, amount)| NewCharge { medical_bill_id, amount, description });
        fields.finish(input)
    }

    fn parse_patch(mut fields: Fields) -> ApiResult<ChargePatch> {
        let patch = ChargePatch {
            amount: fields.patch(&AMOUNT, money),
            description: fields.nullable(&DESCRIPTION, text(0, TEXT_MAX_CHARS)),
        };
        fields.finish(Some(patch))
    }
}

pub(crate) fn router() -> Router<AppState> {
    crud::routes::<Charges>()
}
