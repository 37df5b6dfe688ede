//! Owned resources over HTTP: CRUD, expansion, isolation, and link endpoints.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

// =============================================================================
// CRUD and expansion
// =============================================================================

#[tokio::test]
async fn test_bill_round_trips_total_and_embeds_provider() {
    let app = TestApp::new().await;
    let mut alice = app.user("alice").await;
    let provider = alice.provider("Riverside Clinic").await;

    let created = alice
        .post(
            "/api/medical-bills",
            json!({ "medicalProviderId": provider, "dateOfService": "2024-03-01", "total": "150.00" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["message"], "Medical bill created successfully");
    let bill = created.id();

    let fetched = alice.get(&format!("/api/medical-bills/{bill}")).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.data()["total"].as_f64(), Some(150.0));
    assert_eq!(fetched.data()["dateOfService"], "2024-03-01");
    assert_eq!(fetched.data()["medicalProvider"]["name"], "Riverside Clinic");
    assert_eq!(fetched.data()["medicalProviderId"], provider.as_str());
}

#[tokio::test]
async fn test_provider_crud_with_partial_update() {
    let app = TestApp::new().await;
    let mut user = app.user("crud").await;

    let created = user
        .post(
            "/api/medical-providers",
            json!({ "name": "Lab", "phone": "555-0100", "website": "https://lab.example" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.id();

    let updated = user
        .put(&format!("/api/medical-providers/{id}"), json!({ "phone": null, "address": "1 Main St" }))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["message"], "Medical provider updated successfully");
    assert_eq!(updated.data()["name"], "Lab");
    assert!(updated.data()["phone"].is_null());
    assert_eq!(updated.data()["address"], "1 Main St");
    assert_eq!(updated.data()["website"], "https://lab.example");

    let listed = user.get("/api/medical-providers").await;
    assert_eq!(listed.data().as_array().unwrap().len(), 1);

    let deleted = user.delete(&format!("/api/medical-providers/{id}")).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["message"], "Medical provider deleted successfully");
    assert_eq!(user.get(&format!("/api/medical-providers/{id}")).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_charges_eobs_and_collection_bills() {
    let app = TestApp::new().await;
    let mut user = app.user("ledger").await;
    let provider = user.provider("Hospital").await;
    let bill = user.bill(&provider, json!(200)).await;

    let charge = user
        .post(
            "/api/medical-bill-charges",
            json!({ "medicalBillId": bill, "amount": 19.99, "description": "X-ray" }),
        )
        .await;
    assert_eq!(charge.status, StatusCode::CREATED);
    assert_eq!(charge.data()["medicalBill"]["id"], bill.as_str());
    assert_eq!(charge.data()["amount"].as_f64(), Some(19.99));

    let eob = user
        .post(
            "/api/explanation-of-benefits",
            json!({
                "medicalProviderId": provider,
                "dateOfService": "2024-03-01",
                "totalPaid": 100,
                "totalBilled": 200,
                "totalMayOwe": 100,
                "insurer": "Acme Health",
            }),
        )
        .await;
    assert_eq!(eob.status, StatusCode::CREATED);
    assert_eq!(eob.data()["totalDiscount"].as_f64(), Some(0.0));
    assert_eq!(eob.data()["medicalProvider"]["name"], "Hospital");

    let collection = user
        .post(
            "/api/collection-bills",
            json!({
                "medicalProviderId": provider,
                "dateOfNotice": "2024-06-01T12:00:00Z",
                "dateOfService": "2024-03-01",
                "amountTotal": "75.50",
            }),
        )
        .await;
    assert_eq!(collection.status, StatusCode::CREATED);
    assert_eq!(collection.data()["dateOfNotice"], "2024-06-01");
    assert_eq!(collection.body["message"], "Collection bill created successfully");
}

#[tokio::test]
async fn test_validation_failures_list_fields_and_skip_the_store() {
    let app = TestApp::new().await;
    let mut user = app.user("validator").await;

    let response = user
        .post(
            "/api/medical-bills",
            json!({ "medicalProviderId": "not-a-uuid", "dateOfService": "yesterday", "total": -5 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.details(), vec![
        ("medicalProviderId".to_string(), "Medical provider ID must be a valid UUID".to_string()),
        ("dateOfService".to_string(), "Date of service must be a valid date".to_string()),
        ("total".to_string(), "Total must be a positive number".to_string()),
    ]);
    assert!(user.get("/api/medical-bills").await.data().as_array().unwrap().is_empty());

    let bad_id = user.get("/api/medical-bills/abc").await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.details()[0].1, "Invalid bill ID");
}

// =============================================================================
// Isolation
// =============================================================================

#[tokio::test]
async fn test_other_users_rows_are_not_found() {
    let app = TestApp::new().await;
    let mut alice = app.user("alice").await;
    let mut mallory = app.user("mallory").await;
    let provider = alice.provider("Private Clinic").await;
    let bill = alice.bill(&provider, json!(42)).await;

    let path = format!("/api/medical-bills/{bill}");
    let get = mallory.get(&path).await;
    assert_eq!(get.status, StatusCode::NOT_FOUND);
    assert_eq!(get.body["error"], "Medical bill not found");
    assert_eq!(mallory.put(&path, json!({ "total": 1 })).await.status, StatusCode::NOT_FOUND);
    assert_eq!(mallory.delete(&path).await.status, StatusCode::NOT_FOUND);
    assert!(mallory.get("/api/medical-bills").await.data().as_array().unwrap().is_empty());

    let borrowed = mallory
        .post(
            "/api/medical-bills",
            json!({ "medicalProviderId": provider, "dateOfService": "2024-03-01", "total": 1 }),
        )
        .await;
    assert_eq!(borrowed.status, StatusCode::NOT_FOUND);
    assert!(mallory.get("/api/medical-bills").await.data().as_array().unwrap().is_empty());

    let untouched = alice.get(&path).await;
    assert_eq!(untouched.data()["total"].as_f64(), Some(42.0));
}

#[tokio::test]
async fn test_provider_delete_is_blocked_by_dependents() {
    let app = TestApp::new().await;
    let mut user = app.user("blocked").await;
    let provider = user.provider("In Use").await;
    user.bill(&provider, json!(10)).await;

    let path = format!("/api/medical-providers/{provider}");
    let response = user.delete(&path).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(user.get(&path).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_deleting_eob_clears_service_event_reference() {
    let app = TestApp::new().await;
    let mut user = app.user("setnull").await;
    let provider = user.provider("Clinic").await;
    let eob = user
        .post(
            "/api/explanation-of-benefits",
            json!({
                "medicalProviderId": provider,
                "dateOfService": "2024-03-01",
                "totalPaid": 1,
                "totalBilled": 1,
                "totalMayOwe": 0,
                "insurer": "Acme",
            }),
        )
        .await
        .id();
    let event = user
        .post(
            "/api/medical-service-events",
            json!({
                "medicalProviderId": provider,
                "explanationOfBenefitsId": eob,
                "dateOfService": "2024-03-01",
            }),
        )
        .await;
    assert_eq!(event.status, StatusCode::CREATED);
    assert_eq!(event.data()["explanationOfBenefits"]["insurer"], "Acme");
    let event = event.id();

    assert_eq!(user.delete(&format!("/api/explanation-of-benefits/{eob}")).await.status, StatusCode::OK);
    let fetched = user.get(&format!("/api/medical-service-events/{event}")).await;
    assert!(fetched.data()["explanationOfBenefitsId"].is_null());
    assert!(fetched.data()["explanationOfBenefits"].is_null());
}

// =============================================================================
// Links
// =============================================================================

#[tokio::test]
async fn test_payment_attach_and_detach_bill() {
    let app = TestApp::new().await;
    let mut user = app.user("payer").await;
    let provider = user.provider("Clinic").await;
    let bill = user.bill(&provider, json!(150)).await;

    let payment = user
        .post("/api/medical-bill-payments", json!({ "amount": "50.00", "date": "2024-04-01" }))
        .await;
    assert_eq!(payment.status, StatusCode::CREATED);
    let payment = payment.id();
    let path = format!("/api/medical-bill-payments/{payment}");

    let attached = user.post(&format!("{path}/medical-bills"), json!({ "medicalBillIds": [bill] })).await;
    assert_eq!(attached.status, StatusCode::OK);
    assert_eq!(attached.body["message"], "Medical bills added to payment successfully");

    let again = user.post(&format!("{path}/medical-bills"), json!({ "medicalBillIds": [bill] })).await;
    assert_eq!(again.data()["medicalBills"].as_array().unwrap().len(), 1);

    let fetched = user.get(&path).await;
    assert_eq!(fetched.data()["medicalBills"][0]["id"], bill.as_str());

    let detached = user.delete(&format!("{path}/medical-bills/{bill}")).await;
    assert_eq!(detached.status, StatusCode::OK);
    assert_eq!(detached.body["message"], "Medical bill removed from payment successfully");
    assert!(user.get(&path).await.data()["medicalBills"].as_array().unwrap().is_empty());

    let repeat = user.delete(&format!("{path}/medical-bills/{bill}")).await;
    assert_eq!(repeat.status, StatusCode::OK);
}

#[tokio::test]
async fn test_link_endpoints_require_both_sides_owned() {
    let app = TestApp::new().await;
    let mut alice = app.user("alice").await;
    let mut bob = app.user("bob").await;
    let alice_bill = {
        let provider = alice.provider("A").await;
        alice.bill(&provider, json!(1)).await
    };
    let bob_payment = bob
        .post("/api/medical-bill-payments", json!({ "amount": 1, "date": "2024-04-01" }))
        .await
        .id();

    let response = bob
        .post(
            &format!("/api/medical-bill-payments/{bob_payment}/medical-bills"),
            json!({ "medicalBillIds": [alice_bill] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let malformed = bob
        .post(
            &format!("/api/medical-bill-payments/{bob_payment}/medical-bills"),
            json!({ "medicalBillIds": "nope" }),
        )
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.details()[0].1, "Medical bill IDs must be an array");
}

#[tokio::test]
async fn test_bill_and_service_event_links_from_both_sides() {
    let app = TestApp::new().await;
    let mut user = app.user("linker").await;
    let provider = user.provider("Clinic").await;
    let first = user.bill(&provider, json!(10)).await;
    let second = user.bill(&provider, json!(20)).await;

    let event = user
        .post(
            "/api/medical-service-events",
            json!({
                "medicalProviderId": provider,
                "dateOfService": "2024-03-01",
                "amount": 5,
                "medicalBillIds": [first],
            }),
        )
        .await;
    assert_eq!(event.status, StatusCode::CREATED);
    assert_eq!(event.data()["medicalBills"].as_array().unwrap().len(), 1);
    let event = event.id();

    let attached = user
        .post(
            &format!("/api/medical-service-events/{event}/medical-bills"),
            json!({ "medicalBillIds": [second, first] }),
        )
        .await;
    assert_eq!(attached.data()["medicalBills"].as_array().unwrap().len(), 2);

    let from_bill = user.get(&format!("/api/medical-bills/{second}/service-events")).await;
    assert_eq!(from_bill.data()[0]["id"], event.as_str());

    let detached = user.delete(&format!("/api/medical-bills/{second}/service-events/{event}")).await;
    assert_eq!(detached.status, StatusCode::OK);
    let from_bill = user.get(&format!("/api/medical-bills/{second}/service-events")).await;
    assert!(from_bill.data().as_array().unwrap().is_empty());

    let reattached = user
        .post(
            &format!("/api/medical-bills/{second}/service-events"),
            json!({ "medicalServiceEventIds": [event] }),
        )
        .await;
    assert_eq!(reattached.status, StatusCode::OK);
    assert_eq!(reattached.data().as_array().unwrap().len(), 1);

    let bad = user.delete(&format!("/api/medical-bills/{second}/service-events/xyz")).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.details()[0].1, "Invalid service event ID");
}
