//! The response envelope shared by every endpoint.
//!
//! ```json
//! { "success": true, "data": { ... }, "message": "Medical bill created successfully" }
//! { "success": false, "error": "Validation failed", "details": [{ "field": "total", "message": "..." }] }
//! ```

use medibills_types::validation::ValidationError;
use serde::Serialize;

/// `{success, data?, error?, message?, details?}`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error summary on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Per-field validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// One entry of a validation failure list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Offending field, camelCase as sent by the client.
    pub field: String,
    /// What was wrong with it.
    pub message: String,
}

impl From<&ValidationError> for FieldError {
    fn from(err: &ValidationError) -> Self {
        Self { field: err.field.clone(), message: err.constraint.clone() }
    }
}

impl<T> Envelope<T> {
    /// Successful response carrying `data`.
    pub fn data(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, message: None, details: None }
    }

    /// Attaches a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Envelope<()> {
    /// Successful response with a message and no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
            details: None,
        }
    }

    /// Failed response.
    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()), message: None, details: None }
    }

    /// Attaches validation details.
    #[must_use]
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = Some(details);
        self
    }
}
