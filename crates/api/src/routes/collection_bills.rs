//! `/api/collection-bills`

use axum::Router;
use medibills_store::{CollectionBillRepository, Database};
use medibills_types::{
    ProviderId,
    inputs::{CollectionBillPatch, NewCollectionBill},
};

use super::crud::{self, Resource};
use crate::{
    error::ApiResult,
    fields::{self, Field, Fields, date, money},
    state::AppState,
};

const MEDICAL_PROVIDER_ID: Field =
    Field::new("medicalProviderId", "Medical provider ID must be a valid UUID");
const DATE_OF_NOTICE: Field = Field::new("dateOfNotice", "Date of notice must be a valid date");
const DATE_OF_SERVICE: Field = Field::new("dateOfService", "Date of service must be a valid date");
const AMOUNT_TOTAL: Field = Field::new("amountTotal", "Amount total must be a positive number");

pub(crate) struct CollectionBills;

impl Resource for CollectionBills {
    type Repo = CollectionBillRepository;

    const INVALID_ID: &'static str = "Invalid collection bill ID";

    fn repository(db: &Database) -> Self::Repo {
        db.collection_bills()
    }

    fn parse_new(mut fields: Fields) -> ApiResult<NewCollectionBill> {
        let medical_provider_id = fields.required(&MEDICAL_PROVIDER_ID, fields::id::<ProviderId>);
        let date_of_notice = fields.required(&DATE_OF_NOTICE, date);
        let date_of_service = fields.required(&DATE_OF_SERVICE, date);
        let amount_total = fields.required(&AMOUNT_TOTAL, money);

        let input = match (medical_provider_id, date_of_notice, date_of_service, amount_total) {
            (
                Some(medical_provider_id),
                Some(date_of_notice),
                Some(date_of_service),
                Some(amount_total),
            ) => Some(NewCollectionBill {
                medical_provider_id,
                date_of_notice,
                date_of_service,
                amount_total,
            }),
            _ => None,
        };
        fields.finish(input)
    }

    fn parse_patch(mut fields: Fields) -> ApiResult<CollectionBillPatch> {
        let patch = CollectionBillPatch {
            medical_provider_id: fields.patch(&MEDICAL_PROVIDER_ID, fields::id::<ProviderId>),
            date_of_notice: fields.patch(&DATE_OF_NOTICE, date),
            date_of_service: fields.patch(&DATE_OF_SERVICE, date),
            amount_total: fields.patch(&AMOUNT_TOTAL, money),
        };
        fields.finish(Some(patch))
    }
}

pub(crate) fn router() -> Router<AppState> {
    crud::routes::<CollectionBills>()
}
