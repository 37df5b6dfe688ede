//! Identifier types for MediBills records.
//!
//! Every record is keyed by a random UUIDv4. Each table gets its own newtype so
//! a bill id can never be passed where a provider id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identifier Types
// ============================================================================

/// Generates a newtype wrapper around [`Uuid`] for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` so the wire format is the bare UUID string
/// - `From<Uuid>` and `Into<Uuid>` conversions
/// - `Display` with a semantic prefix (e.g., `bill:6f1c...`)
/// - `generate()` for fresh ids and `as_uuid()` accessor
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wraps an existing UUID.
            #[inline]
            pub const fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Generates a fresh random identifier.
            #[inline]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the raw UUID.
            #[inline]
            pub const fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<Uuid>().map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a registered user.
    ///
    /// # Display
    ///
    /// Formats with `user:` prefix.
    UserId, "user"
);

define_id!(
    /// Unique identifier for a medical provider.
    ///
    /// # Display
    ///
    /// Formats with `provider:` prefix.
    ProviderId, "provider"
);

define_id!(
    /// Unique identifier for a medical bill.
    ///
    /// # Display
    ///
    /// Formats with `bill:` prefix.
    BillId, "bill"
);

define_id!(
    /// Unique identifier for a single line item on a medical bill.
    ChargeId, "charge"
);

define_id!(
    /// Unique identifier for an explanation of benefits.
    EobId, "eob"
);

define_id!(
    /// Unique identifier for a collection notice.
    CollectionBillId, "collection"
);

define_id!(
    /// Unique identifier for a medical service event.
    ServiceEventId, "event"
);

define_id!(
    /// Unique identifier for a payment toward one or more bills.
    PaymentId, "payment"
);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = BillId::generate();
        let b = BillId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_uses_prefix() {
        let raw = Uuid::nil();
        assert_eq!(
            ProviderId::from_uuid(raw).to_string(),
            "provider:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(EobId::from_uuid(raw).to_string(), "eob:00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_from_str_accepts_bare_uuid() {
        let raw = Uuid::new_v4();
        let parsed: PaymentId = raw.to_string().parse().unwrap();
        assert_eq!(parsed.as_uuid(), raw);
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let raw = Uuid::new_v4();
        let json = serde_json::to_string(&ChargeId::from_uuid(raw)).unwrap();
        assert_eq!(json, format!("\"{raw}\""));
        let back: ChargeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_uuid(), raw);
    }
}
