//! Fixed table definitions for the store.
//!
//! The schema has exactly 11 tables, all known at compile time. Referential
//! rules live in the DDL so SQLite enforces them transactionally:
//!
//! | Reference                         | On delete   |
//! |-----------------------------------|-------------|
//! | owned row → `users`               | `CASCADE`   |
//! | bill/EOB/collection/event → provider | `NO ACTION` |
//! | charge → bill                     | `CASCADE`   |
//! | event → EOB                       | `SET NULL`  |
//! | join rows → either side           | `CASCADE`   |
//!
//! Provider references use `NO ACTION` rather than `RESTRICT`: both block a
//! direct provider delete, but `NO ACTION` is checked at the end of the
//! statement, which lets a user delete cascade through providers and their
//! dependents in one go.

/// Compile-time table identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    // ========================================================================
    // Accounts
    // ========================================================================
    /// Registered users.
    Users,
    /// Server-side sessions keyed by token digest.
    Sessions,

    // ========================================================================
    // Owned records
    // ========================================================================
    /// Medical providers.
    MedicalProviders,
    /// Medical bills.
    MedicalBills,
    /// Bill line items.
    MedicalBillCharges,
    /// Explanations of benefits.
    ExplanationOfBenefits,
    /// Collection notices.
    CollectionBills,
    /// Service events.
    MedicalServiceEvents,
    /// Payments.
    MedicalBillPayments,

    // ========================================================================
    // Join tables
    // ========================================================================
    /// Bill ↔ service event links.
    MedicalBillServiceEvents,
    /// Bill ↔ payment links.
    MedicalBillPaymentAssociations,
}

impl Table {
    /// Total number of tables.
    pub const COUNT: usize = 11;

    /// All tables in creation order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Users,
        Self::Sessions,
        Self::MedicalProviders,
        Self::MedicalBills,
        Self::MedicalBillCharges,
        Self::ExplanationOfBenefits,
        Self::CollectionBills,
        Self::MedicalServiceEvents,
        Self::MedicalBillPayments,
        Self::MedicalBillServiceEvents,
        Self::MedicalBillPaymentAssociations,
    ];

    /// SQL table name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Sessions => "sessions",
            Self::MedicalProviders => "medical_providers",
            Self::MedicalBills => "medical_bills",
            Self::MedicalBillCharges => "medical_bill_charges",
            Self::ExplanationOfBenefits => "explanation_of_benefits",
            Self::CollectionBills => "collection_bills",
            Self::MedicalServiceEvents => "medical_service_events",
            Self::MedicalBillPayments => "medical_bill_payments",
            Self::MedicalBillServiceEvents => "medical_bill_service_events",
            Self::MedicalBillPaymentAssociations => "medical_bill_payment_associations",
        }
    }
}

/// Idempotent DDL for the whole schema.
pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id              BLOB PRIMARY KEY NOT NULL,
    username        TEXT NOT NULL UNIQUE,
    email           TEXT NOT NULL UNIQUE,
    password_hash   TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id                  TEXT PRIMARY KEY NOT NULL,
    user_id             BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at          TEXT NOT NULL,
    last_seen_at        TEXT NOT NULL,
    expires_at          TEXT NOT NULL,
    absolute_expires_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

CREATE TABLE IF NOT EXISTS medical_providers (
    id              BLOB PRIMARY KEY NOT NULL,
    user_id         BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    address         TEXT,
    phone           TEXT,
    website         TEXT,
    payment_website TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_medical_providers_user ON medical_providers(user_id);
CREATE INDEX IF NOT EXISTS idx_medical_providers_user_name ON medical_providers(user_id, name);

CREATE TABLE IF NOT EXISTS medical_bills (
    id                  BLOB PRIMARY KEY NOT NULL,
    user_id             BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    medical_provider_id BLOB NOT NULL REFERENCES medical_providers(id) ON DELETE NO ACTION,
    date_of_service     TEXT NOT NULL,
    total               INTEGER NOT NULL CHECK (total >= 0),
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_medical_bills_user ON medical_bills(user_id);
CREATE INDEX IF NOT EXISTS idx_medical_bills_user_date ON medical_bills(user_id, date_of_service);
CREATE INDEX IF NOT EXISTS idx_medical_bills_provider ON medical_bills(medical_provider_id);

CREATE TABLE IF NOT EXISTS medical_bill_charges (
    id              BLOB PRIMARY KEY NOT NULL,
    medical_bill_id BLOB NOT NULL REFERENCES medical_bills(id) ON DELETE CASCADE,
    amount          INTEGER NOT NULL CHECK (amount >= 0),
    description     TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_medical_bill_charges_bill ON medical_bill_charges(medical_bill_id);

CREATE TABLE IF NOT EXISTS explanation_of_benefits (
    id                  BLOB PRIMARY KEY NOT NULL,
    user_id             BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    medical_provider_id BLOB NOT NULL REFERENCES medical_providers(id) ON DELETE NO ACTION,
    date_of_service     TEXT NOT NULL,
    total_paid          INTEGER NOT NULL CHECK (total_paid >= 0),
    total_billed        INTEGER NOT NULL CHECK (total_billed >= 0),
    total_discount      INTEGER NOT NULL DEFAULT 0 CHECK (total_discount >= 0),
    total_may_owe       INTEGER NOT NULL CHECK (total_may_owe >= 0),
    insurer             TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_eob_user ON explanation_of_benefits(user_id);
CREATE INDEX IF NOT EXISTS idx_eob_user_date ON explanation_of_benefits(user_id, date_of_service);
CREATE INDEX IF NOT EXISTS idx_eob_provider ON explanation_of_benefits(medical_provider_id);

CREATE TABLE IF NOT EXISTS collection_bills (
    id                  BLOB PRIMARY KEY NOT NULL,
    user_id             BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    medical_provider_id BLOB NOT NULL REFERENCES medical_providers(id) ON DELETE NO ACTION,
    date_of_notice      TEXT NOT NULL,
    date_of_service     TEXT NOT NULL,
    amount_total        INTEGER NOT NULL CHECK (amount_total >= 0),
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_collection_bills_user ON collection_bills(user_id);
CREATE INDEX IF NOT EXISTS idx_collection_bills_user_notice ON collection_bills(user_id, date_of_notice);
CREATE INDEX IF NOT EXISTS idx_collection_bills_provider ON collection_bills(medical_provider_id);

CREATE TABLE IF NOT EXISTS medical_service_events (
    id                          BLOB PRIMARY KEY NOT NULL,
    user_id                     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    medical_provider_id         BLOB NOT NULL REFERENCES medical_providers(id) ON DELETE NO ACTION,
    explanation_of_benefits_id  BLOB REFERENCES explanation_of_benefits(id) ON DELETE SET NULL,
    date_of_service             TEXT NOT NULL,
    description                 TEXT,
    amount                      INTEGER CHECK (amount IS NULL OR amount >= 0),
    created_at                  TEXT NOT NULL,
    updated_at                  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_service_events_user ON medical_service_events(user_id);
CREATE INDEX IF NOT EXISTS idx_service_events_user_date ON medical_service_events(user_id, date_of_service);
CREATE INDEX IF NOT EXISTS idx_service_events_provider ON medical_service_events(medical_provider_id);
CREATE INDEX IF NOT EXISTS idx_service_events_eob ON medical_service_events(explanation_of_benefits_id);

CREATE TABLE IF NOT EXISTS medical_bill_payments (
    id          BLOB PRIMARY KEY NOT NULL,
    user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    amount      INTEGER NOT NULL CHECK (amount >= 0),
    date        TEXT NOT NULL,
    notes       TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_payments_user ON medical_bill_payments(user_id);
CREATE INDEX IF NOT EXISTS idx_payments_user_date ON medical_bill_payments(user_id, date);

CREATE TABLE IF NOT EXISTS medical_bill_service_events (
    id                       BLOB PRIMARY KEY NOT NULL,
    medical_bill_id          BLOB NOT NULL REFERENCES medical_bills(id) ON DELETE CASCADE,
    medical_service_event_id BLOB NOT NULL REFERENCES medical_service_events(id) ON DELETE CASCADE,
    created_at               TEXT NOT NULL,
    updated_at               TEXT NOT NULL,
    UNIQUE (medical_bill_id, medical_service_event_id)
);
CREATE INDEX IF NOT EXISTS idx_bill_events_bill ON medical_bill_service_events(medical_bill_id);
CREATE INDEX IF NOT EXISTS idx_bill_events_event ON medical_bill_service_events(medical_service_event_id);

CREATE TABLE IF NOT EXISTS medical_bill_payment_associations (
    medical_bill_id         BLOB NOT NULL REFERENCES medical_bills(id) ON DELETE CASCADE,
    medical_bill_payment_id BLOB NOT NULL REFERENCES medical_bill_payments(id) ON DELETE CASCADE,
    created_at              TEXT NOT NULL,
    PRIMARY KEY (medical_bill_id, medical_bill_payment_id)
);
CREATE INDEX IF NOT EXISTS idx_payment_assoc_payment ON medical_bill_payment_associations(medical_bill_payment_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tables_listed_once() {
        let mut names: Vec<_> = Table::ALL.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Table::COUNT);
    }

    #[test]
    fn test_schema_creates_every_table() {
        for table in Table::ALL {
            let ddl = format!("CREATE TABLE IF NOT EXISTS {} (", table.name());
            assert!(SCHEMA_SQL.contains(&ddl), "schema is missing {}", table.name());
        }
    }

    #[test]
    fn test_provider_references_are_not_cascading() {
        let cascading = SCHEMA_SQL
            .lines()
            .filter(|line| line.contains("REFERENCES medical_providers(id)"))
            .filter(|line| !line.contains("NO ACTION"))
            .count();
        assert_eq!(cascading, 0);
    }
}
