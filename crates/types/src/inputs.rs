//! Validated write payloads.
//!
//! `New*` types carry everything needed to insert a row; `*Patch` types carry a
//! partial update where `None` leaves a column unchanged. Nullable columns use
//! `Option<Option<T>>` so a client can clear them with an explicit `null`.
//!
//! None of these carry a user id: ownership always comes from the session.

use chrono::NaiveDate;

use crate::{
    money::Money,
    types::{BillId, EobId, ProviderId},
};

/// Registration payload after the password has been hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Profile change; at least one field is normally present.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub email: Option<String>,
}

impl ProfilePatch {
    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewProvider {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub payment_website: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderPatch {
    pub name: Option<String>,
    pub address: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub website: Option<Option<String>>,
    pub payment_website: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct NewBill {
    pub medical_provider_id: ProviderId,
    pub date_of_service: NaiveDate,
    pub total: Money,
}

#[derive(Debug, Clone, Default)]
pub struct BillPatch {
    pub medical_provider_id: Option<ProviderId>,
    pub date_of_service: Option<NaiveDate>,
    pub total: Option<Money>,
}

#[derive(Debug, Clone)]
pub struct NewCharge {
    pub medical_bill_id: BillId,
    pub amount: Money,
    pub description: Option<String>,
}

/// Charges stay attached to the bill they were created on.
#[derive(Debug, Clone, Default)]
pub struct ChargePatch {
    pub amount: Option<Money>,
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct NewEob {
    pub medical_provider_id: ProviderId,
    pub date_of_service: NaiveDate,
    pub total_paid: Money,
    pub total_billed: Money,
    pub total_discount: Money,
    pub total_may_owe: Money,
    pub insurer: String,
}

#[derive(Debug, Clone, Default)]
pub struct EobPatch {
    pub medical_provider_id: Option<ProviderId>,
    pub date_of_service: Option<NaiveDate>,
    pub total_paid: Option<Money>,
    pub total_billed: Option<Money>,
    pub total_discount: Option<Money>,
    pub total_may_owe: Option<Money>,
    pub insurer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCollectionBill {
    pub medical_provider_id: ProviderId,
    pub date_of_notice: NaiveDate,
    pub date_of_service: NaiveDate,
    pub amount_total: Money,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionBillPatch {
    pub medical_provider_id: Option<ProviderId>,
    pub date_of_notice: Option<NaiveDate>,
    pub date_of_service: Option<NaiveDate>,
    pub amount_total: Option<Money>,
}

/// New service event. `medical_bill_ids` are linked in the same transaction.
#[derive(Debug, Clone)]
pub struct NewServiceEvent {
    pub medical_provider_id: ProviderId,
    pub explanation_of_benefits_id: Option<EobId>,
    pub date_of_service: NaiveDate,
    pub description: Option<String>,
    pub amount: Option<Money>,
    pub medical_bill_ids: Vec<BillId>,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceEventPatch {
    pub medical_provider_id: Option<ProviderId>,
    pub explanation_of_benefits_id: Option<Option<EobId>>,
    pub date_of_service: Option<NaiveDate>,
    pub description: Option<Option<String>>,
    pub amount: Option<Option<Money>>,
}

/// New payment. `medical_bill_ids` are linked in the same transaction.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Money,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub medical_bill_ids: Vec<BillId>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentPatch {
    pub amount: Option<Money>,
    pub date: Option<NaiveDate>,
    pub notes: Option<Option<String>>,
}
