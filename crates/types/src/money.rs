//! Monetary amounts stored as whole cents.
//!
//! Every amount in the ledger (bill totals, charges, payments, EOB figures) is a
//! non-negative [`Money`] value with at most two fractional digits. Amounts are
//! persisted as `INTEGER` cents and cross the JSON boundary as plain numbers.
//!
//! Parsing accepts the forms a form-driven client sends:
//!
//! - JSON numbers: `150`, `150.5`, `150.25`
//! - Decimal strings: `"150"`, `"150.5"`, `"150.25"`

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use snafu::Snafu;

/// Largest representable amount in cents (99,999,999.99).
pub const MAX_CENTS: i64 = 9_999_999_999;

/// Error returned when a value cannot be represented as [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum MoneyError {
    /// Amount is below zero.
    #[snafu(display("amount must not be negative"))]
    Negative,

    /// Amount exceeds [`MAX_CENTS`].
    #[snafu(display("amount must not exceed 99999999.99"))]
    TooLarge,

    /// Amount has more than two fractional digits.
    #[snafu(display("amount must have at most two decimal places"))]
    Precision,

    /// Input is not a decimal number.
    #[snafu(display("'{input}' is not a valid amount"))]
    Malformed {
        /// The rejected input.
        input: String,
    },
}

/// A non-negative monetary amount in whole cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from whole cents.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] if `cents` is negative or above [`MAX_CENTS`].
    pub fn from_cents(cents: i64) -> Result<Self, MoneyError> {
        if cents < 0 {
            return Err(MoneyError::Negative);
        }
        if cents > MAX_CENTS {
            return Err(MoneyError::TooLarge);
        }
        Ok(Self(cents))
    }

    /// Returns the amount in whole cents.
    #[inline]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Converts a floating point amount, rejecting sub-cent precision.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] for non-finite, negative, oversized, or
    /// over-precise values.
    pub fn from_f64(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::Malformed { input: value.to_string() });
        }
        if value < 0.0 {
            return Err(MoneyError::Negative);
        }
        let scaled = value * 100.0;
        let rounded = scaled.round();
        // Tolerates binary float noise such as 19.99 * 100 = 1998.9999999999998.
        if (scaled - rounded).abs() > 1e-6 {
            return Err(MoneyError::Precision);
        }
        if rounded > MAX_CENTS as f64 {
            return Err(MoneyError::TooLarge);
        }
        Self::from_cents(rounded as i64)
    }

    /// Parses a decimal string such as `"150"`, `"150.5"` or `"150.25"`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] if the string is not a plain non-negative decimal
    /// with at most two fractional digits.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let trimmed = input.trim();
        if let Some(rest) = trimmed.strip_prefix('-')
            && !rest.is_empty()
            && rest.chars().all(|c| c.is_ascii_digit() || c == '.')
        {
            return Err(MoneyError::Negative);
        }

        let (whole, frac) = match trimmed.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (trimmed, ""),
        };
        let malformed = || MoneyError::Malformed { input: input.to_string() };

        if (whole.is_empty() && frac.is_empty())
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(malformed());
        }
        if frac.len() > 2 {
            return Err(MoneyError::Precision);
        }
        if whole.len() > 8 {
            return Err(MoneyError::TooLarge);
        }

        let whole_cents = if whole.is_empty() {
            0
        } else {
            whole.parse::<i64>().map_err(|_| malformed())? * 100
        };
        let frac_cents = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| malformed())? * 10,
            _ => frac.parse::<i64>().map_err(|_| malformed())?,
        };
        Self::from_cents(whole_cents + frac_cents)
    }

    /// Formats with exactly two fractional digits: `"150.00"`.
    pub fn format(self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }

    /// Returns the amount as a floating point number of currency units.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl TryFrom<i64> for Money {
    type Error = MoneyError;

    fn try_from(cents: i64) -> Result<Self, Self::Error> {
        Self::from_cents(cents)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl de::Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative amount as a number or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        let cents = i64::try_from(v)
            .ok()
            .and_then(|units| units.checked_mul(100))
            .ok_or_else(|| E::custom(MoneyError::TooLarge))?;
        Money::from_cents(cents).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        let cents = v.checked_mul(100).ok_or_else(|| E::custom(MoneyError::TooLarge))?;
        Money::from_cents(cents).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Money::from_f64(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    // =========================================================================
    // parse / format
    // =========================================================================

    #[test]
    fn test_parse_whole_number() {
        assert_eq!(Money::parse("150").unwrap().cents(), 15_000);
    }

    #[test]
    fn test_parse_one_fraction_digit() {
        assert_eq!(Money::parse("150.5").unwrap().cents(), 15_050);
    }

    #[test]
    fn test_parse_two_fraction_digits() {
        assert_eq!(Money::parse("0.07").unwrap().cents(), 7);
    }

    #[test]
    fn test_parse_leading_dot() {
        assert_eq!(Money::parse(".25").unwrap().cents(), 25);
    }

    #[test]
    fn test_parse_rejects_three_fraction_digits() {
        assert_eq!(Money::parse("1.005"), Err(MoneyError::Precision));
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert_eq!(Money::parse("-5.00"), Err(MoneyError::Negative));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Money::parse("12a"), Err(MoneyError::Malformed { .. })));
        assert!(matches!(Money::parse(""), Err(MoneyError::Malformed { .. })));
        assert!(matches!(Money::parse("."), Err(MoneyError::Malformed { .. })));
        assert!(matches!(Money::parse("1.2.3"), Err(MoneyError::Malformed { .. })));
    }

    #[test]
    fn test_parse_upper_bound() {
        assert_eq!(Money::parse("99999999.99").unwrap().cents(), MAX_CENTS);
        assert_eq!(Money::parse("100000000"), Err(MoneyError::TooLarge));
    }

    #[test]
    fn test_format_pads_cents() {
        assert_eq!(Money::from_cents(15_000).unwrap().format(), "150.00");
        assert_eq!(Money::from_cents(5).unwrap().format(), "0.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    // =========================================================================
    // from_f64
    // =========================================================================

    #[test]
    fn test_from_f64_tolerates_float_noise() {
        assert_eq!(Money::from_f64(19.99).unwrap().cents(), 1_999);
        assert_eq!(Money::from_f64(0.1 + 0.2).unwrap().cents(), 30);
    }

    #[test]
    fn test_from_f64_rejects_sub_cent() {
        assert_eq!(Money::from_f64(1.234), Err(MoneyError::Precision));
    }

    #[test]
    fn test_from_f64_rejects_nan() {
        assert!(matches!(Money::from_f64(f64::NAN), Err(MoneyError::Malformed { .. })));
    }

    // =========================================================================
    // serde
    // =========================================================================

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_value(Money::from_cents(15_000).unwrap()).unwrap();
        assert_eq!(json.as_f64(), Some(150.0));
    }

    #[test]
    fn test_deserializes_numbers_and_strings() {
        let from_int: Money = serde_json::from_str("150").unwrap();
        let from_float: Money = serde_json::from_str("150.25").unwrap();
        let from_str: Money = serde_json::from_str("\"150.25\"").unwrap();
        assert_eq!(from_int.cents(), 15_000);
        assert_eq!(from_float.cents(), 15_025);
        assert_eq!(from_str, from_float);
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        assert!(serde_json::from_str::<Money>("-1").is_err());
    }

    proptest! {
        /// Formatting then parsing any valid amount yields the same cents.
        #[test]
        fn prop_format_parse_preserves_cents(cents in 0i64..=MAX_CENTS) {
            let money = Money::from_cents(cents).unwrap();
            prop_assert_eq!(Money::parse(&money.format()).unwrap(), money);
        }
    }
}
