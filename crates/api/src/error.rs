//! API error type and its HTTP rendering.
//!
//! Every handler returns [`ApiResult`]. Errors render as the shared
//! [`Envelope`] with `success: false`; the status code comes from the
//! [`ErrorCode`] catalog.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use medibills_store::StoreError;
use medibills_types::{ErrorCode, validation::ValidationError};
use snafu::Snafu;
use tracing::{debug, error};

use crate::envelope::{Envelope, FieldError};

/// Result type alias for handlers and services.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Client-facing message used in place of internal error text.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Errors produced while serving a request.
///
/// The `Display` text of each variant is what the client sees in the
/// envelope's `error` field, except for internal failures, which are replaced
/// by [`INTERNAL_ERROR_MESSAGE`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    /// One or more request fields failed validation.
    #[snafu(display("Validation failed"))]
    Validation {
        /// Per-field failures, in the order they were found.
        details: Vec<ValidationError>,
    },

    /// The body could not be read as JSON.
    #[snafu(display("{message}"))]
    Rejected {
        /// Status chosen by the body extractor.
        status: StatusCode,
        /// Extractor's description of the problem.
        message: String,
    },

    /// No valid session accompanies the request.
    #[snafu(display("Authentication required"))]
    Unauthenticated,

    /// A session exists where none is allowed.
    #[snafu(display("Already authenticated"))]
    AlreadyAuthenticated,

    /// A password check failed.
    #[snafu(display("{message}"))]
    InvalidCredentials {
        /// Deliberately generic description.
        message: &'static str,
    },

    /// The client exhausted its request budget.
    #[snafu(display("Too many requests from this IP, please try again later."))]
    RateLimited {
        /// Seconds until a retry may succeed.
        retry_after_secs: u64,
    },

    /// No route matched.
    #[snafu(display("Route not found"))]
    RouteNotFound {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// A storage operation failed.
    #[snafu(display("{source}"))]
    Store {
        /// The underlying store error.
        source: StoreError,
    },

    /// bcrypt failed to hash or verify.
    #[snafu(display("Password hashing failed: {source}"))]
    Hash {
        /// The underlying bcrypt error.
        source: bcrypt::BcryptError,
    },

    /// A blocking task panicked or was cancelled.
    #[snafu(display("Background task failed: {source}"))]
    Join {
        /// The underlying join error.
        source: tokio::task::JoinError,
    },
}

impl ApiError {
    /// Generic credential failure.
    pub(crate) const fn invalid_credentials() -> Self {
        Self::InvalidCredentials { message: "Invalid credentials" }
    }

    /// Maps this error into the shared error catalog.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } | Self::Rejected { .. } => ErrorCode::ValidationFailed,
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::AlreadyAuthenticated => ErrorCode::AlreadyAuthenticated,
            Self::InvalidCredentials { .. } => ErrorCode::InvalidCredentials,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::RouteNotFound { .. } => ErrorCode::NotFound,
            Self::Store { source } => source.code(),
            Self::Hash { .. } | Self::Join { .. } => ErrorCode::Internal,
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        if let Self::Rejected { status, .. } = self {
            return *status;
        }
        StatusCode::from_u16(self.code().http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn envelope(&self) -> Envelope<()> {
        match self {
            Self::Validation { details } => Envelope::failure(self.to_string())
                .with_details(details.iter().map(FieldError::from).collect()),
            Self::Unauthenticated | Self::AlreadyAuthenticated => {
                Envelope::failure(self.to_string()).with_message(self.code().suggested_action())
            },
            Self::RouteNotFound { method, path } => {
                Envelope::failure(self.to_string()).with_message(format!("Cannot {method} {path}"))
            },
            _ if self.code().is_server_error() => Envelope::failure(INTERNAL_ERROR_MESSAGE),
            _ => Envelope::failure(self.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

/// The real message behind a suppressed internal error.
///
/// Attached to 500 responses as an extension; the error-details middleware
/// renders it back into the body outside production.
#[derive(Debug, Clone)]
pub(crate) struct InternalErrorDetail(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        if code.is_server_error() {
            error!(error = %self, code = code.as_str(), "Request failed");
        } else {
            debug!(error = %self, code = code.as_str(), "Request rejected");
        }

        let mut response = (self.status(), Json(self.envelope())).into_response();
        match &self {
            Self::RateLimited { retry_after_secs } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            },
            _ if code.is_server_error() => {
                response.extensions_mut().insert(InternalErrorDetail(self.to_string()));
            },
            _ => {},
        }
        response
    }
}
