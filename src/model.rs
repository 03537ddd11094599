//! Customer aggregate, payment history records, and operation inputs/outputs.
//!
//! JSON rendering uses camelCase field names (`serialNumber`, `nextDueDate`,
//! `daysOverdue`, ...). Dates are calendar days (`"2024-01-31"`).

use crate::engine::{BillingEngine, StatusDerivation};
use crate::entity::LedgerDocument;
use crate::error::{Error, Result};
use crate::plan::{BillingStatus, PaymentPlan};
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Billing state
// ============================================================================

/// The mutable subscription fields of a customer.
///
/// Invariants:
/// - `days_overdue > 0` ⇒ `status == Overdue`
/// - `status == Overdue` ⇒ `next_due_date` is set (and before "today" as of the
///   last derivation)
/// - `status == Paid` ⇒ `days_overdue == 0`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingState {
    pub last_paid_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    pub status: BillingStatus,
    pub days_overdue: u32,
}

impl BillingState {
    /// State of a customer who paid on `paid_on` under `plan`.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if the next due date is not representable.
    pub fn paid_on(plan: &PaymentPlan, paid_on: NaiveDate) -> Result<Self> {
        Ok(BillingState {
            last_paid_date: Some(paid_on),
            next_due_date: Some(BillingEngine::compute_next_due_date(plan, paid_on)?),
            status: BillingStatus::Paid,
            days_overdue: 0,
        })
    }

    pub fn derivation(&self) -> StatusDerivation {
        StatusDerivation::new(self.status, self.days_overdue)
    }

    /// Run the per-write derivation against `today`.
    ///
    /// Returns the previous status/overdue pair.
    pub fn apply_derivation(&mut self, today: NaiveDate) -> StatusDerivation {
        let previous = self.derivation();
        let derived = BillingEngine::derive_status(self.next_due_date, previous, today);
        self.status = derived.status;
        self.days_overdue = derived.days_overdue;
        previous
    }

    /// Derived copy, leaving `self` untouched.
    pub fn derived(&self, today: NaiveDate) -> Self {
        let mut state = self.clone();
        state.apply_derivation(today);
        state
    }

    /// Clear everything back to a fresh, never-billed state.
    pub fn reset(&mut self) {
        *self = BillingState::default();
    }

    pub fn is_reset(&self) -> bool {
        *self == BillingState::default()
    }

    /// Structural invariants that hold regardless of the current date.
    pub fn check_structure(&self) -> Result<()> {
        if self.days_overdue > 0 && self.status != BillingStatus::Overdue {
            return Err(Error::ValidationError(format!(
                "daysOverdue is {} but status is {}",
                self.days_overdue, self.status
            )));
        }
        if self.status == BillingStatus::Overdue && self.next_due_date.is_none() {
            return Err(Error::ValidationError(
                "status Overdue requires a next due date".to_string(),
            ));
        }
        Ok(())
    }

    /// Full invariant check as of `today`, run after derivation.
    pub fn check_invariants(&self, today: NaiveDate) -> Result<()> {
        self.check_structure()?;
        if self.status == BillingStatus::Overdue {
            if let Some(due) = self.next_due_date {
                if due >= today {
                    return Err(Error::ValidationError(format!(
                        "status Overdue but next due date {} is not before {}",
                        due, today
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Customer
// ============================================================================

/// Descriptive fields; inert with respect to billing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactDetails {
    pub account_number: String,
    pub mobile_number: String,
    pub address: String,
    pub pin_code: String,
    pub city: String,
    pub caf: String,
    pub vc_number: String,
}

impl ContactDetails {
    /// Copy with every field trimmed.
    pub fn trimmed(&self) -> Self {
        ContactDetails {
            account_number: self.account_number.trim().to_string(),
            mobile_number: self.mobile_number.trim().to_string(),
            address: self.address.trim().to_string(),
            pin_code: self.pin_code.trim().to_string(),
            city: self.city.trim().to_string(),
            caf: self.caf.trim().to_string(),
            vc_number: self.vc_number.trim().to_string(),
        }
    }
}

/// A subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub serial_number: String,
    pub name: String,
    pub payment_plan: PaymentPlan,
    pub billing: BillingState,
    pub notes: String,
    pub contact: ContactDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// New customer with an empty billing state.
    pub fn new(
        serial_number: String,
        name: String,
        payment_plan: PaymentPlan,
        now: DateTime<Utc>,
    ) -> Self {
        Customer {
            id: Uuid::now_v7(),
            serial_number,
            name,
            payment_plan,
            billing: BillingState::default(),
            notes: String::new(),
            contact: ContactDetails::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> BillingStatus {
        self.billing.status
    }

    pub fn next_due_date(&self) -> Option<NaiveDate> {
        self.billing.next_due_date
    }

    pub fn summary(&self) -> CustomerSummary {
        CustomerSummary {
            id: self.id,
            name: self.name.clone(),
            serial_number: self.serial_number.clone(),
        }
    }
}

impl LedgerDocument for Customer {
    fn document_id(&self) -> Uuid {
        self.id
    }

    fn collection() -> &'static str {
        "customer"
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::ValidationError(
                "Customer name is required".to_string(),
            ));
        }
        self.billing.check_structure()
    }
}

/// Identity fields of a customer, joined onto payment listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: String,
    pub serial_number: String,
}

/// Build an auto-generated serial number: `{prefix}-{unix millis}-{9 base36 chars}`.
///
/// Uniqueness is best-effort; the store rejects duplicates and the caller
/// regenerates.
pub fn generate_serial_number(prefix: &str, now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", prefix, now.timestamp_millis(), suffix)
}

// ============================================================================
// Payment history
// ============================================================================

/// Immutable history entry for one recorded payment or status event.
///
/// The only permitted mutation is `status_at_payment → Paid` via
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub amount: u32,
    pub payment_date: NaiveDate,
    pub plan_at_payment: PaymentPlan,
    pub status_at_payment: BillingStatus,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(
        customer_id: Uuid,
        plan: PaymentPlan,
        status: BillingStatus,
        payment_date: NaiveDate,
        note: String,
        now: DateTime<Utc>,
    ) -> Self {
        PaymentRecord {
            id: Uuid::now_v7(),
            customer_id,
            amount: BillingEngine::payment_amount(&plan),
            payment_date,
            plan_at_payment: plan,
            status_at_payment: status,
            note,
            created_at: now,
        }
    }
}

impl LedgerDocument for PaymentRecord {
    fn document_id(&self) -> Uuid {
        self.id
    }

    fn collection() -> &'static str {
        "payment"
    }
}

/// A payment record joined with its owner's identity.
///
/// `customer` is `None` when the owning customer no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWithCustomer {
    pub payment: PaymentRecord,
    pub customer: Option<CustomerSummary>,
}

// ============================================================================
// Operation inputs
// ============================================================================

/// Input for customer creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewCustomer {
    pub name: String,
    pub serial_number: Option<String>,
    pub payment_plan: Option<PaymentPlan>,
    pub first_payment_date: Option<NaiveDate>,
    /// Seed the billing state as paid today when no first payment date is given.
    pub paid_today: bool,
    pub notes: Option<String>,
    pub contact: ContactDetails,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>) -> Self {
        NewCustomer {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_plan(mut self, plan: PaymentPlan) -> Self {
        self.payment_plan = Some(plan);
        self
    }

    pub fn with_first_payment_date(mut self, date: NaiveDate) -> Self {
        self.first_payment_date = Some(date);
        self
    }

    /// Treat the customer as having paid on the day of creation.
    pub fn paid_today(mut self) -> Self {
        self.paid_today = true;
        self
    }

    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_contact(mut self, contact: ContactDetails) -> Self {
        self.contact = contact;
        self
    }
}

/// Operator-provided payment event.
///
/// A value with neither `payment_date` nor `status` is a pure plan edit and
/// produces no history record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentUpdate {
    pub payment_date: Option<NaiveDate>,
    pub status: Option<BillingStatus>,
    pub payment_plan: Option<PaymentPlan>,
    pub note: Option<String>,
}

impl PaymentUpdate {
    /// Payment received on `date`.
    pub fn paid_on(date: NaiveDate) -> Self {
        PaymentUpdate {
            payment_date: Some(date),
            ..Default::default()
        }
    }

    /// Explicit status change with no payment date.
    pub fn status(status: BillingStatus) -> Self {
        PaymentUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: BillingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_plan(mut self, plan: PaymentPlan) -> Self {
        self.payment_plan = Some(plan);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// True when this update must append a history record.
    pub fn is_billing_event(&self) -> bool {
        self.payment_date.is_some() || self.status.is_some()
    }
}

/// Edit of descriptive fields. Never touches billing dates or status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub payment_plan: Option<PaymentPlan>,
    pub notes: Option<String>,
    pub contact: Option<ContactDetails>,
}

impl ProfileUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        ProfileUpdate {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_plan(mut self, plan: PaymentPlan) -> Self {
        self.payment_plan = Some(plan);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_contact(mut self, contact: ContactDetails) -> Self {
        self.contact = Some(contact);
        self
    }
}

// ============================================================================
// Operation outputs
// ============================================================================

/// Outcome of [`crate::service::BillingService::record_payment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub customer: Customer,
    pub record: Option<PaymentRecord>,
}

/// Outcome of a bulk billing reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    /// Customers whose billing state actually changed.
    pub customers_updated: u64,
    pub history_cleared: bool,
    pub records_deleted: u64,
}

/// Outcome of deleting a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCustomer {
    pub customer: Customer,
    pub records_deleted: u64,
}
