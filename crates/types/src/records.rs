//! Persisted records and their expanded API views.
//!
//! Records are plain immutable values mirroring one table row each. Views wrap a
//! record together with one level of related data; they are what list and
//! detail endpoints return. JSON field names are camelCase.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    money::Money,
    types::{BillId, ChargeId, CollectionBillId, EobId, PaymentId, ProviderId, ServiceEventId, UserId},
};

// ============================================================================
// Records
// ============================================================================

/// A registered account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A doctor, clinic, lab, or other billing entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalProvider {
    pub id: ProviderId,
    pub user_id: UserId,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub payment_website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bill received from a provider for a date of service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalBill {
    pub id: BillId,
    pub user_id: UserId,
    pub medical_provider_id: ProviderId,
    pub date_of_service: NaiveDate,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item on a bill. Ownership follows the parent bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalBillCharge {
    pub id: ChargeId,
    pub medical_bill_id: BillId,
    pub amount: Money,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An insurer's explanation of benefits for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationOfBenefits {
    pub id: EobId,
    pub user_id: UserId,
    pub medical_provider_id: ProviderId,
    pub date_of_service: NaiveDate,
    pub total_paid: Money,
    pub total_billed: Money,
    pub total_discount: Money,
    pub total_may_owe: Money,
    pub insurer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A collection agency notice for an unpaid provider balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBill {
    pub id: CollectionBillId,
    pub user_id: UserId,
    pub medical_provider_id: ProviderId,
    pub date_of_notice: NaiveDate,
    pub date_of_service: NaiveDate,
    pub amount_total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A visit, procedure, or test performed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalServiceEvent {
    pub id: ServiceEventId,
    pub user_id: UserId,
    pub medical_provider_id: ProviderId,
    pub explanation_of_benefits_id: Option<EobId>,
    pub date_of_service: NaiveDate,
    pub description: Option<String>,
    pub amount: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A payment made toward one or more bills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalBillPayment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub amount: Money,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Summaries (embedded one level deep)
// ============================================================================

/// Provider fields embedded in bills, EOBs, collection bills, and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub id: ProviderId,
    pub name: String,
}

/// Bill fields embedded in charges, events, and payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSummary {
    pub id: BillId,
    pub medical_provider_id: ProviderId,
    pub date_of_service: NaiveDate,
    pub total: Money,
}

/// EOB fields embedded in service events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EobSummary {
    pub id: EobId,
    pub insurer: String,
    pub date_of_service: NaiveDate,
}

// ============================================================================
// Views
// ============================================================================

/// A bill with its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillView {
    #[serde(flatten)]
    pub bill: MedicalBill,
    pub medical_provider: ProviderSummary,
}

/// A charge with its parent bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeView {
    #[serde(flatten)]
    pub charge: MedicalBillCharge,
    pub medical_bill: BillSummary,
}

/// An EOB with its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EobView {
    #[serde(flatten)]
    pub eob: ExplanationOfBenefits,
    pub medical_provider: ProviderSummary,
}

/// A collection bill with its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBillView {
    #[serde(flatten)]
    pub collection_bill: CollectionBill,
    pub medical_provider: ProviderSummary,
}

/// A service event with its provider, optional EOB, and linked bills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEventView {
    #[serde(flatten)]
    pub event: MedicalServiceEvent,
    pub medical_provider: ProviderSummary,
    pub explanation_of_benefits: Option<EobSummary>,
    pub medical_bills: Vec<BillSummary>,
}

/// A payment with the bills it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    #[serde(flatten)]
    pub payment: MedicalBillPayment,
    pub medical_bills: Vec<BillSummary>,
}

impl From<&MedicalBill> for BillSummary {
    fn from(bill: &MedicalBill) -> Self {
        Self {
            id: bill.id,
            medical_provider_id: bill.medical_provider_id,
            date_of_service: bill.date_of_service,
            total: bill.total,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_bill() -> MedicalBill {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        MedicalBill {
            id: BillId::generate(),
            user_id: UserId::generate(),
            medical_provider_id: ProviderId::generate(),
            date_of_service: NaiveDate::from_ymd_opt(2024, 2, 14).unwrap(),
            total: Money::from_cents(15_000).unwrap(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_bill_view_flattens_and_embeds_provider() {
        let bill = sample_bill();
        let provider_id = bill.medical_provider_id;
        let view = BillView {
            bill,
            medical_provider: ProviderSummary { id: provider_id, name: "Clinic".into() },
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["total"].as_f64(), Some(150.0));
        assert_eq!(json["dateOfService"], "2024-02-14");
        assert_eq!(json["medicalProvider"]["name"], "Clinic");
        assert!(json.get("bill").is_none(), "record fields should be flattened");
    }

    #[test]
    fn test_user_has_no_password_field() {
        let at = Utc::now();
        let user = User {
            id: UserId::generate(),
            username: "demo".into(),
            email: "demo@x.com".into(),
            created_at: at,
            updated_at: at,
        };
        let json = serde_json::to_value(&user).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert!(keys.iter().all(|k| !k.to_lowercase().contains("password")));
    }

    #[test]
    fn test_service_event_view_serializes_null_eob() {
        let at = Utc::now();
        let provider = ProviderSummary { id: ProviderId::generate(), name: "Lab".into() };
        let view = ServiceEventView {
            event: MedicalServiceEvent {
                id: ServiceEventId::generate(),
                user_id: UserId::generate(),
                medical_provider_id: provider.id,
                explanation_of_benefits_id: None,
                date_of_service: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                description: None,
                amount: None,
                created_at: at,
                updated_at: at,
            },
            medical_provider: provider,
            explanation_of_benefits: None,
            medical_bills: vec![BillSummary::from(&sample_bill())],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["explanationOfBenefits"].is_null());
        assert!(json["explanationOfBenefitsId"].is_null());
        assert_eq!(json["medicalBills"].as_array().unwrap().len(), 1);
    }
}
