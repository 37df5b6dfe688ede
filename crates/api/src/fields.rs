//! Request body field reading with error collection.
//!
//! A [`Fields`] wraps the JSON object sent by the client. Each accessor reads
//! one field, records any failure, and keeps going, so a single response can
//! report every invalid field. [`Fields::finish`] turns the collected failures
//! into [`ApiError::Validation`].
//!
//! Presence rules:
//!
//! | accessor     | absent        | `null`        | value          |
//! |--------------|---------------|---------------|----------------|
//! | `required`   | error         | error         | `Some(v)`      |
//! | `optional`   | `None`        | `None`        | `Some(v)`      |
//! | `patch`      | `None`        | error         | `Some(v)`      |
//! | `nullable`   | `None`        | `Some(None)`  | `Some(Some(v))`|

use chrono::NaiveDate;
use medibills_types::{
    Money,
    validation::{ValidationError, parse_date, validate_length, validate_url},
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// A named body field and the message reported when it is missing or malformed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Field {
    pub name: &'static str,
    pub message: &'static str,
}

impl Field {
    pub(crate) const fn new(name: &'static str, message: &'static str) -> Self {
        Self { name, message }
    }

    pub(crate) fn error(&self) -> ValidationError {
        ValidationError::new(self.name, self.message)
    }
}

enum Slot<T> {
    Missing,
    Null,
    Value(T),
    Invalid,
}

/// Validating reader over a JSON object body.
#[derive(Debug, Default)]
pub(crate) struct Fields {
    body: Map<String, Value>,
    errors: Vec<ValidationError>,
}

impl Fields {
    pub(crate) fn new(body: Map<String, Value>) -> Self {
        Self { body, errors: Vec::new() }
    }

    fn read<T, P>(&mut self, field: &Field, parse: P) -> Slot<T>
    where
        P: FnOnce(&Field, &Value) -> Result<T, ValidationError>,
    {
        match self.body.get(field.name) {
            None => Slot::Missing,
            Some(Value::Null) => Slot::Null,
            Some(value) => match parse(field, value) {
                Ok(parsed) => Slot::Value(parsed),
                Err(err) => {
                    self.errors.push(err);
                    Slot::Invalid
                },
            },
        }
    }

    pub(crate) fn required<T, P>(&mut self, field: &Field, parse: P) -> Option<T>
    where
        P: FnOnce(&Field, &Value) -> Result<T, ValidationError>,
    {
        match self.read(field, parse) {
            Slot::Value(value) => Some(value),
            Slot::Missing | Slot::Null => {
                self.errors.push(field.error());
                None
            },
            Slot::Invalid => None,
        }
    }

    pub(crate) fn optional<T, P>(&mut self, field: &Field, parse: P) -> Option<T>
    where
        P: FnOnce(&Field, &Value) -> Result<T, ValidationError>,
    {
        match self.read(field, parse) {
            Slot::Value(value) => Some(value),
            Slot::Missing | Slot::Null | Slot::Invalid => None,
        }
    }

    pub(crate) fn patch<T, P>(&mut self, field: &Field, parse: P) -> Option<T>
    where
        P: FnOnce(&Field, &Value) -> Result<T, ValidationError>,
    {
        match self.read(field, parse) {
            Slot::Value(value) => Some(value),
            Slot::Null => {
                self.errors.push(field.error());
                None
            },
            Slot::Missing | Slot::Invalid => None,
        }
    }

    pub(crate) fn nullable<T, P>(&mut self, field: &Field, parse: P) -> Option<Option<T>>
    where
        P: FnOnce(&Field, &Value) -> Result<T, ValidationError>,
    {
        match self.read(field, parse) {
            Slot::Value(value) => Some(Some(value)),
            Slot::Null => Some(None),
            Slot::Missing | Slot::Invalid => None,
        }
    }

    /// Reads an array of UUIDs. Item failures are reported as `field[i]`.
    ///
    /// When not `required`, an absent or `null` field reads as empty.
    pub(crate) fn ids<T: From<Uuid>>(
        &mut self,
        field: &Field,
        item_message: &'static str,
        required: bool,
    ) -> Option<Vec<T>> {
        match self.body.get(field.name) {
            None | Some(Value::Null) if !required => Some(Vec::new()),
            Some(Value::Array(items)) => {
                let mut ids = Vec::with_capacity(items.len());
                let mut valid = true;
                for (index, item) in items.iter().enumerate() {
                    match item.as_str().and_then(|raw| Uuid::parse_str(raw).ok()) {
                        Some(uuid) => ids.push(T::from(uuid)),
                        None => {
                            valid = false;
                            self.errors.push(ValidationError::new(
                                format!("{}[{index}]", field.name),
                                item_message,
                            ));
                        },
                    }
                }
                valid.then_some(ids)
            },
            _ => {
                self.errors.push(field.error());
                None
            },
        }
    }

    /// Returns `value` if no failure was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] listing every recorded failure.
    pub(crate) fn finish<T>(self, value: Option<T>) -> ApiResult<T> {
        match value {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(ApiError::Validation { details: self.errors }),
        }
    }
}

// ============================================================================
// Parsers
// ============================================================================

pub(crate) fn as_str<'v>(field: &Field, value: &'v Value) -> Result<&'v str, ValidationError> {
    value.as_str().ok_or_else(|| field.error())
}

/// A string whose character count lies in `min..=max`.
pub(crate) fn text(
    min: usize,
    max: usize,
) -> impl FnOnce(&Field, &Value) -> Result<String, ValidationError> {
    move |field, value| {
        let raw = as_str(field, value)?;
        validate_length(field.name, raw, min, max, field.message)?;
        Ok(raw.to_owned())
    }
}

/// Any non-empty string. Used for credentials, which are never echoed back.
pub(crate) fn non_empty(field: &Field, value: &Value) -> Result<String, ValidationError> {
    let raw = as_str(field, value)?;
    if raw.is_empty() {
        return Err(field.error());
    }
    Ok(raw.to_owned())
}

/// An absolute `http`/`https` URL.
pub(crate) fn url(field: &Field, value: &Value) -> Result<String, ValidationError> {
    let raw = as_str(field, value)?;
    validate_url(field.name, raw, field.message)?;
    Ok(raw.to_owned())
}

/// A non-negative amount, as a JSON number or decimal string.
pub(crate) fn money(field: &Field, value: &Value) -> Result<Money, ValidationError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64().map(Money::from_f64),
        Value::String(raw) => Some(Money::parse(raw)),
        _ => None,
    };
    match parsed {
        Some(Ok(amount)) => Ok(amount),
        _ => Err(field.error()),
    }
}

/// An ISO-8601 date or date-time.
pub(crate) fn date(field: &Field, value: &Value) -> Result<NaiveDate, ValidationError> {
    parse_date(field.name, as_str(field, value)?, field.message)
}

/// A UUID, wrapped in its identifier type.
pub(crate) fn id<T: From<Uuid>>(field: &Field, value: &Value) -> Result<T, ValidationError> {
    let raw = as_str(field, value)?;
    Uuid::parse_str(raw).map(T::from).map_err(|_| field.error())
}
