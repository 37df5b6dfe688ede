//! Input validation for API request fields.
//!
//! Every check returns a [`ValidationError`] whose `constraint` is the
//! human-readable sentence shown to the client next to the offending field.
//!
//! ## Character Whitelists
//!
//! - Usernames: `[a-zA-Z0-9_]{3,50}`
//! - Emails: `local@domain.tld`, no whitespace, at most 255 characters
//! - URLs: absolute `http` or `https` with a host

use std::fmt;

use chrono::{DateTime, NaiveDate};

/// Minimum username length in characters.
pub const USERNAME_MIN_CHARS: usize = 3;
/// Maximum username length in characters.
pub const USERNAME_MAX_CHARS: usize = 50;
/// Minimum password length in characters.
pub const PASSWORD_MIN_CHARS: usize = 8;
/// Maximum length for names, insurers, and emails.
pub const NAME_MAX_CHARS: usize = 255;
/// Maximum length for phone numbers.
pub const PHONE_MAX_CHARS: usize = 20;
/// Maximum length for addresses, descriptions, and notes.
pub const TEXT_MAX_CHARS: usize = 1000;

/// Validation error with structured context.
///
/// Contains the field name and the violated constraint as a display sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation (camelCase, as sent by the client).
    pub field: String,
    /// Description of the violated constraint.
    pub constraint: String,
}

impl ValidationError {
    /// Creates a validation error for `field`.
    pub fn new(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self { field: field.into(), constraint: constraint.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)
    }
}

impl std::error::Error for ValidationError {}

/// Validates a username.
///
/// # Errors
///
/// Returns [`ValidationError`] if the username is not 3–50 characters of
/// `[a-zA-Z0-9_]`.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(ValidationError::new(
            "username",
            format!(
                "Username must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"
            ),
        ));
    }
    if !username.chars().all(is_username_char) {
        return Err(ValidationError::new(
            "username",
            "Username can only contain letters, numbers, and underscores",
        ));
    }
    Ok(())
}

/// Validates the structure of an email address.
///
/// # Errors
///
/// Returns [`ValidationError`] if the address lacks a single `@`, has an empty
/// local part, a domain without a dot, whitespace, or exceeds 255 characters.
pub fn validate_email(field: &str, email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::new(field, "Please provide a valid email address");

    if email.is_empty() || email.chars().count() > NAME_MAX_CHARS {
        return Err(invalid());
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid());
    };
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }
    for label in &labels {
        if label.is_empty()
            || label.starts_with('-')
            || label.ends_with('-')
            || !label.chars().all(|c| c.is_alphanumeric() || c == '-')
        {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Normalizes an email for storage and lookup: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates password strength.
///
/// `label` prefixes the message, e.g. `"Password"` or `"New password"`.
///
/// # Errors
///
/// Returns [`ValidationError`] if the password is shorter than 8 characters or
/// lacks a lowercase letter, an uppercase letter, or a digit.
pub fn validate_password(field: &str, label: &str, password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ValidationError::new(
            field,
            format!("{label} must be at least {PASSWORD_MIN_CHARS} characters long"),
        ));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Err(ValidationError::new(
            field,
            format!(
                "{label} must contain at least one lowercase letter, one uppercase letter, and one number"
            ),
        ));
    }
    Ok(())
}

/// Validates that a string's character count lies within `min..=max`.
///
/// # Errors
///
/// Returns [`ValidationError`] carrying `message` when out of range.
pub fn validate_length(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
    message: &str,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::new(field, message));
    }
    Ok(())
}

/// Validates an absolute `http`/`https` URL with a host.
///
/// # Errors
///
/// Returns [`ValidationError`] carrying `message` if parsing fails or the
/// scheme or host is unsuitable.
pub fn validate_url(field: &str, value: &str, message: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(value).map_err(|_| ValidationError::new(field, message))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ValidationError::new(field, message));
    }
    Ok(())
}

/// Parses an ISO-8601 calendar date.
///
/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp, in which case the date
/// part in the timestamp's own offset is kept.
///
/// # Errors
///
/// Returns [`ValidationError`] carrying `message` if neither form parses.
pub fn parse_date(field: &str, value: &str, message: &str) -> Result<NaiveDate, ValidationError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.date_naive())
        .map_err(|_| ValidationError::new(field, message))
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
