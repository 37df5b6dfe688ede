//! Shared fixtures for unit tests in this crate.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::NaiveDate;
use medibills_test_utils::TestDir;
use medibills_types::{
    MedicalProvider, Money, ProviderId, UserId,
    config::DatabaseConfig,
    inputs::{NewBill, NewEob, NewProvider, NewServiceEvent, NewUser},
};

use crate::{Database, OwnedRepository};

/// A migrated temp database with two registered users.
pub(crate) struct Fixture {
    _dir: TestDir,
    pub db: Database,
    pub alice: UserId,
    pub bob: UserId,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = TestDir::new();
        let config = DatabaseConfig::builder().url(dir.sqlite_url("store.sqlite")).build().unwrap();
        let db = Database::open(&config).await.unwrap();
        db.migrate().await.unwrap();

        let alice = db.users().create(new_user("alice")).await.unwrap().id;
        let bob = db.users().create(new_user("bob")).await.unwrap().id;
        Self { _dir: dir, db, alice, bob }
    }

    pub async fn provider(&self, user: UserId, name: &str) -> MedicalProvider {
        self.db.providers().create_for_user(user, new_provider(name)).await.unwrap()
    }
}

fn new_user(name: &str) -> NewUser {
    NewUser {
        username: name.to_string(),
        email: format!("{name}@example.com"),
        password_hash: "$2b$04$fixturehash".to_string(),
    }
}

pub(crate) fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

pub(crate) fn new_provider(name: &str) -> NewProvider {
    NewProvider {
        name: name.to_string(),
        address: None,
        phone: None,
        website: None,
        payment_website: None,
    }
}

pub(crate) fn new_bill(provider: ProviderId) -> NewBill {
    NewBill {
        medical_provider_id: provider,
        date_of_service: date("2024-02-14"),
        total: Money::from_cents(15_000).unwrap(),
    }
}

pub(crate) fn new_eob(provider: ProviderId) -> NewEob {
    NewEob {
        medical_provider_id: provider,
        date_of_service: date("2024-02-14"),
        total_paid: Money::from_cents(10_000).unwrap(),
        total_billed: Money::from_cents(15_000).unwrap(),
        total_discount: Money::ZERO,
        total_may_owe: Money::from_cents(5_000).unwrap(),
        insurer: "Acme Health".to_string(),
    }
}

pub(crate) fn new_event(provider: ProviderId) -> NewServiceEvent {
    NewServiceEvent {
        medical_provider_id: provider,
        explanation_of_benefits_id: None,
        date_of_service: date("2024-02-14"),
        description: Some("Annual physical".to_string()),
        amount: None,
        medical_bill_ids: Vec::new(),
    }
}
