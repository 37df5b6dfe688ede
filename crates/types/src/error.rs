//! Machine-readable error codes shared by every MediBills layer.
//!
//! Each failure that can reach a client maps to exactly one [`ErrorCode`]. The
//! store and API crates carry their own `snafu` error enums and classify
//! themselves into this catalog; the HTTP layer turns a code into a status.

use core::fmt;

/// Machine-readable error codes for programmatic error handling.
///
/// Codes are organized into ranges:
///
/// | Range     | Domain         | Examples                                  |
/// |-----------|----------------|-------------------------------------------|
/// | 1000–1099 | Input          | Validation failures                       |
/// | 2000–2099 | Authentication | Missing session, bad credentials          |
/// | 3000–3099 | Data access    | Not found, conflict, forbidden            |
/// | 4000–4099 | Admission      | Rate limiting                             |
/// | 5000–5099 | Server         | Internal errors                           |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // --- Input errors (1000–1099) ---
    /// Malformed or out-of-range input. Carries per-field details.
    ValidationFailed = 1000,

    // --- Authentication errors (2000–2099) ---
    /// No valid session is attached to the request.
    Unauthenticated = 2000,
    /// A guest-only endpoint was called with a live session.
    AlreadyAuthenticated = 2001,
    /// Username, email, or password did not match. Deliberately generic.
    InvalidCredentials = 2002,

    // --- Data access errors (3000–3099) ---
    /// The caller may not touch the requested row.
    Forbidden = 3000,
    /// The requested row does not exist for the caller.
    NotFound = 3001,
    /// Duplicate unique value or a delete blocked by dependent rows.
    Conflict = 3002,

    // --- Admission errors (4000–4099) ---
    /// Per-client request budget exhausted.
    RateLimited = 4000,

    // --- Server errors (5000–5099) ---
    /// Unexpected failure; details are logged, not returned.
    Internal = 5000,
}

impl ErrorCode {
    /// Returns the numeric code value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a numeric code to an `ErrorCode`, returning `None` for unknown values.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::ValidationFailed),
            2000 => Some(Self::Unauthenticated),
            2001 => Some(Self::AlreadyAuthenticated),
            2002 => Some(Self::InvalidCredentials),
            3000 => Some(Self::Forbidden),
            3001 => Some(Self::NotFound),
            3002 => Some(Self::Conflict),
            4000 => Some(Self::RateLimited),
            5000 => Some(Self::Internal),
            _ => None,
        }
    }

    /// HTTP status code for this error.
    ///
    /// Conflicts share 400 with validation failures, matching what existing
    /// clients of the API expect.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::ValidationFailed | Self::AlreadyAuthenticated | Self::Conflict => 400,
            Self::Unauthenticated | Self::InvalidCredentials => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::RateLimited => 429,
            Self::Internal => 500,
        }
    }

    /// Whether the failure is caused by the server rather than the request.
    ///
    /// Server-side failures have their messages suppressed outside development.
    #[must_use]
    pub const fn is_server_error(self) -> bool {
        matches!(self, Self::Internal)
    }

    /// Stable snake_case label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "validation_failed",
            Self::Unauthenticated => "unauthenticated",
            Self::AlreadyAuthenticated => "already_authenticated",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate_limited",
            Self::Internal => "internal",
        }
    }

    /// Suggested recovery action for this error code.
    ///
    /// Returned as the `message` field of error responses when no more specific
    /// hint is available.
    #[must_use]
    pub const fn suggested_action(self) -> &'static str {
        match self {
            Self::ValidationFailed => "Correct the listed fields and resubmit.",
            Self::Unauthenticated => "Please log in to access this resource",
            Self::AlreadyAuthenticated => "You are already logged in",
            Self::InvalidCredentials => "Check the username or email and password.",
            Self::Forbidden => "This resource belongs to another account.",
            Self::NotFound => "Verify the identifier and that the record belongs to you.",
            Self::Conflict => "Remove dependent records or choose a different value.",
            Self::RateLimited => "Wait before retrying; see the Retry-After header.",
            Self::Internal => "Retry later. If the problem persists, contact support.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}
