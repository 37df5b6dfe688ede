//! `/api/medical-providers`

use axum::Router;
use medibills_store::{Database, ProviderRepository};
use medibills_types::{
    inputs::{NewProvider, ProviderPatch},
    validation::{NAME_MAX_CHARS, PHONE_MAX_CHARS, TEXT_MAX_CHARS},
};

use super::crud::{self, Resource};
use crate::{
    error::ApiResult,
    fields::{Field, Fields, text, url},
    state::AppState,
};

const NAME: Field = Field::new("name", "Name must be between 1 and 255 characters");
const ADDRESS: Field = Field::new("address", "Address must be less than 1000 characters");
const PHONE: Field = Field::new("phone", "Phone must be less than 20 characters");
const WEBSITE: Field = Field::new("website", "Website must be a valid URL");
const PAYMENT_WEBSITE: Field = Field::new("paymentWebsite", "Payment website must be a valid URL");

pub(crate) struct Providers;

impl Resource for Providers {
    type Repo = ProviderRepository;

    const INVALID_ID: &'static str = "Invalid provider ID";

    fn repository(db: &Database) -> Self::Repo {
        db.providers()
    }

    fn parse_new(mut fields: Fields) -> ApiResult<NewProvider> {
        let name = fields.required(&NAME, text(1, NAME_MAX_CHARS));
        let address = fields.optional(&ADDRESS, text(0, TEXT_MAX_CHARS));
        let phone = fields.optional(&PHONE, text(0, PHONE_MAX_CHARS));
        let website = fields.optional(&WEBSITE, url);
        let payment_website = fields.optional(&PAYMENT_WEBSITE, url);
        let input =
            name.map(|name| NewProvider { name, address, phone, website, payment_website });
        fields.finish(input)
    }

    fn parse_patch(mut fields: Fields) -> ApiResult<ProviderPatch> {
        let patch = ProviderPatch {
            name: fields.patch(&NAME, text(1, NAME_MAX_CHARS)),
            address: fields.nullable(&ADDRESS, text(0, TEXT_MAX_CHARS)),
            phone: fields.nullable(&PHONE, text(0, PHONE_MAX_CHARS)),
            website: fields.nullable(&WEBSITE, url),
            payment_website: fields.nullable(&PAYMENT_WEBSITE, url),
        };
        fields.finish(Some(patch))
    }
}

pub(crate) fn router() -> Router<AppState> {
    crud::routes::<Providers>()
}
