//! Request extractors shared by the route modules.

use std::str::FromStr;

use axum::{
    Json,
    async_trait,
    extract::{FromRequest, Request},
};
use medibills_types::validation::ValidationError;
use serde_json::Value;

use crate::{
    error::{ApiError, ApiResult},
    fields::Fields,
};

/// A JSON object body, ready for field-by-field validation.
///
/// Malformed JSON keeps the status axum chose for it but is rendered in the
/// envelope. A body that is valid JSON but not an object is a validation
/// failure.
#[derive(Debug)]
pub(crate) struct JsonBody(pub Fields);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await.map_err(|rejection| {
            ApiError::Rejected { status: rejection.status(), message: rejection.body_text() }
        })?;
        match value {
            Value::Object(map) => Ok(Self(Fields::new(map))),
            _ => Err(ApiError::Validation {
                details: vec![ValidationError::new("body", "Request body must be a JSON object")],
            }),
        }
    }
}

/// Parses a path segment as an identifier.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] naming `field` with `message` when the
/// segment is not a UUID.
pub(crate) fn path_id<T: FromStr>(field: &str, raw: &str, message: &str) -> ApiResult<T> {
    raw.parse().map_err(|_| ApiError::Validation {
        details: vec![ValidationError::new(field, message)],
    })
}
