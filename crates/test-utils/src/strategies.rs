//! Proptest strategies for MediBills domain values.
//!
//! Strategies produce values that pass the field validators, so properties can
//! focus on behavior rather than on rejection paths.
//!
//! # Usage
//!
//! ```no_run
//! use medibills_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(cents in strategies::arb_cents()) {
//!         // test invariant with a randomly generated amount
//!     }
//! }
//! ```

use chrono::NaiveDate;
use medibills_types::money::MAX_CENTS;
use proptest::prelude::*;

/// Generates an amount in cents across the full accepted range.
pub fn arb_cents() -> impl Strategy<Value = i64> {
    prop_oneof![
        // Common amounts
        0i64..1_000_000,
        // Anywhere up to the ceiling
        0i64..=MAX_CENTS,
        // Boundaries
        Just(0i64),
        Just(MAX_CENTS),
    ]
}

/// Generates a valid username: 3-50 characters of `[A-Za-z0-9_]`.
pub fn arb_username() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{3,50}"
}

/// Generates a lowercase email address with a dotted domain.
pub fn arb_email() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9._]{0,15}", "[a-z][a-z0-9]{0,10}", prop::sample::select(vec!["com", "org", "net"]))
        .prop_map(|(local, domain, tld)| format!("{local}@{domain}.{tld}"))
}

/// Generates a password with at least one lowercase, uppercase, and digit.
pub fn arb_password() -> impl Strategy<Value = String> {
    ("[a-z]{3,10}", "[A-Z]{3,10}", "[0-9]{2,6}")
        .prop_map(|(lower, upper, digits)| format!("{upper}{lower}{digits}"))
}

/// Generates a calendar date between 1990 and 2040.
pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..=2040, 1u32..=12, 1u32..=28)
        .prop_filter_map("valid calendar date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
}
