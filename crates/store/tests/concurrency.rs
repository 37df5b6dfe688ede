//! Concurrent writes through the ownership-scoped repositories.
//!
//! Every write path checks ownership inside the same transaction that writes,
//! so overlapping requests must queue on the database lock rather than fail.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::NaiveDate;
use medibills_store::{Database, OwnedRepository, Table};
use medibills_test_utils::{TestDir, test_database_config};
use medibills_types::{
    BillId, Money, ProviderId, UserId,
    inputs::{NewBill, NewPayment, NewProvider, NewUser, ProfilePatch, ProviderPatch},
};

const TASKS: usize = 40;

async fn open(dir: &TestDir) -> Database {
    let db = Database::open(&test_database_config(dir)).await.unwrap();
    db.migrate().await.unwrap();
    db
}

async fn register(db: &Database, name: &str) -> UserId {
    db.users()
        .create(NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "$2b$04$concurrencyhash".to_string(),
        })
        .await
        .unwrap()
        .id
}

async fn provider(db: &Database, user: UserId) -> ProviderId {
    db.providers()
        .create_for_user(user, NewProvider {
            name: "Lakeside Clinic".to_string(),
            address: None,
            phone: None,
            website: None,
            payment_website: None,
        })
        .await
        .unwrap()
        .id
}

fn new_bill(provider: ProviderId, cents: i64) -> NewBill {
    NewBill {
        medical_provider_id: provider,
        date_of_service: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        total: Money::from_cents(cents).unwrap(),
    }
}

// ============================================================================
// Creates
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_all_succeed() {
    let dir = TestDir::new();
    let db = open(&dir).await;
    let user = register(&db, "parallel").await;
    let provider = provider(&db, user).await;

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                db.bills().create_for_user(user, new_bill(provider, 100 + i as i64)).await
            })
        })
        .collect();

    let mut failures = Vec::new();
    for handle in handles {
        if let Err(err) = handle.await.unwrap() {
            failures.push(err.to_string());
        }
    }
    assert!(failures.is_empty(), "{} of {TASKS} creates failed: {failures:?}", failures.len());
    assert_eq!(db.bills().list_for_user(user).await.unwrap().len(), TASKS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_across_users_stay_isolated() {
    let dir = TestDir::new();
    let db = open(&dir).await;
    let alice = register(&db, "alice").await;
    let bob = register(&db, "bob").await;
    let alice_provider = provider(&db, alice).await;
    let bob_provider = provider(&db, bob).await;

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let db = db.clone();
            let (user, provider) =
                if i % 2 == 0 { (alice, alice_provider) } else { (bob, bob_provider) };
            tokio::spawn(async move { db.bills().create_for_user(user, new_bill(provider, 500)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(db.bills().list_for_user(alice).await.unwrap().len(), TASKS / 2);
    assert_eq!(db.bills().list_for_user(bob).await.unwrap().len(), TASKS / 2);
}

// ============================================================================
// Updates
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_all_succeed() {
    let dir = TestDir::new();
    let db = open(&dir).await;
    let user = register(&db, "renamer").await;
    let provider = provider(&db, user).await;

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                let patch = ProviderPatch { name: Some(format!("Clinic {i}")), ..Default::default() };
                db.providers().update_for_user(user, provider, patch).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let name = db.providers().get_for_user(user, provider).await.unwrap().name;
    assert!(name.starts_with("Clinic "), "{name}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_profile_updates_all_succeed() {
    let dir = TestDir::new();
    let db = open(&dir).await;
    let users: Vec<UserId> =
        register_all(&db, (0..8).map(|i| format!("profile{i}")).collect()).await;

    let handles: Vec<_> = users
        .iter()
        .enumerate()
        .map(|(i, &user)| {
            let db = db.clone();
            tokio::spawn(async move {
                let patch =
                    ProfilePatch { email: Some(format!("moved{i}@example.com")), username: None };
                db.users().update_profile(user, patch).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

async fn register_all(db: &Database, names: Vec<String>) -> Vec<UserId> {
    let mut users = Vec::with_capacity(names.len());
    for name in names {
        users.push(register(db, &name).await);
    }
    users
}

// ============================================================================
// Links
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_attach_of_same_pair_links_once() {
    let dir = TestDir::new();
    let db = open(&dir).await;
    let user = register(&db, "linker").await;
    let provider = provider(&db, user).await;
    let bill: BillId = db.bills().create_for_user(user, new_bill(provider, 2_500)).await.unwrap().bill.id;
    let payment = db
        .payments()
        .create_for_user(user, NewPayment {
            amount: Money::from_cents(2_500).unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            notes: None,
            medical_bill_ids: Vec::new(),
        })
        .await
        .unwrap()
        .payment
        .id;

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move { db.payments().attach_bills(user, payment, &[bill]).await })
        })
        .collect();
    for handle in handles {
        let view = handle.await.unwrap().unwrap();
        assert_eq!(view.medical_bills.len(), 1);
    }

    assert_eq!(db.row_count(Table::MedicalBillPaymentAssociations).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_attach_and_detach_never_fail() {
    let dir = TestDir::new();
    let db = open(&dir).await;
    let user = register(&db, "toggler").await;
    let provider = provider(&db, user).await;
    let bill = db.bills().create_for_user(user, new_bill(provider, 900)).await.unwrap().bill.id;
    let payment = db
        .payments()
        .create_for_user(user, NewPayment {
            amount: Money::from_cents(900).unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            notes: None,
            medical_bill_ids: Vec::new(),
        })
        .await
        .unwrap()
        .payment
        .id;

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    db.payments().attach_bills(user, payment, &[bill]).await.map(|_| ())
                } else {
                    db.payments().detach_bill(user, payment, bill).await
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(db.row_count(Table::MedicalBillPaymentAssociations).await.unwrap() <= 1);
}
