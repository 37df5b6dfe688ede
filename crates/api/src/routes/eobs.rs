//! `/api/explanation-of-benefits`

use axum::Router;
use medibills_store::{Database, EobRepository};
use medibills_types::{
    Money, ProviderId,
    inputs::{EobPatch, NewEob},
    validation::NAME_MAX_CHARS,
};

use super::crud::{self, Resource};
use crate::{
    error::ApiResult,
    fields::{self, Field, Fields, date, money, text},
    state::AppState,
};

const MEDICAL_PROVIDER_ID: Field =
    Field::new("medicalProviderId", "Medical provider ID must be a valid UUID");
const DATE_OF_SERVICE: Field = Field::new("dateOfService", "Date of service must be a valid date");
const TOTAL_PAID: Field = Field::new("totalPaid", "Total paid must be a positive number");
const TOTAL_BILLED: Field = Field::new("totalBilled", "Total billed must be a positive number");
const TOTAL_DISCOUNT: Field =
    Field::new("totalDiscount", "Total discount must be a positive number");
const TOTAL_MAY_OWE: Field = Field::new("totalMayOwe", "Total may owe must be a positive number");
const INSURER: Field = Field::new("insurer", "Insurer must be between 1 and 255 characters");

pub(crate) struct Eobs;

impl Resource for Eobs {
    type Repo = EobRepository;

    const INVALID_ID: &'static str = "Invalid EOB ID";

    fn repository(db: &Database) -> Self::Repo {
        db.eobs()
    }

    fn parse_new(mut fields: Fields) -> ApiResult<NewEob> {
        let medical_provider_id = fields.required(&MEDICAL_PROVIDER_ID, fields::id::<ProviderId>);
        let date_of_service = fields.required(&DATE_OF_SERVICE, date);
        let total_paid = fields.required(&TOTAL_PAID, money);
        let total_billed = fields.required(&TOTAL_BILLED, money);
        let total_discount = fields.optional(&TOTAL_DISCOUNT, money).unwrap_or(Money::ZERO);
        let total_may_owe = fields.required(&TOTAL_MAY_OWE, money);
        let insurer = fields.required(&INSURER, text(1, NAME_MAX_CHARS));

        let input = match (
            medical_provider_id,
            date_of_service,
            total_paid,
            total_billed,
            total_may_owe,
            insurer,
        ) {
            (
                Some(medical_provider_id),
                Some(date_of_service),
                Some(total_paid),
                Some(total_billed),
                Some(total_may_owe),
                Some(insurer),
            ) => Some(NewEob {
                medical_provider_id,
                date_of_service,
                total_paid,
                total_billed,
                total_discount,
                total_may_owe,
                insurer,
            }),
            _ => None,
        };
        fields.finish(input)
    }

    fn parse_patch(mut fields: Fields) -> ApiResult<EobPatch> {
        let patch = EobPatch {
            medical_provider_id: fields.patch(&MEDICAL_PROVIDER_ID, fields::id::<ProviderId>),
            date_of_service: fields.patch(&DATE_OF_SERVICE, date),
            total_paid: fields.patch(&TOTAL_PAID, money),
            total_billed: fields.patch(&TOTAL_BILLED, money),
            total_discount: fields.patch(&TOTAL_DISCOUNT, money),
            total_may_owe: fields.patch(&TOTAL_MAY_OWE, money),
            insurer: fields.patch(&INSURER, text(1, NAME_MAX_CHARS)),
        };
        fields.finish(Some(patch))
    }
}

pub(crate) fn router() -> Router<AppState> {
    crud::routes::<Eobs>()
}
