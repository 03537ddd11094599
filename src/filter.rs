//! Query filters for customers and payment history.
//!
//! Filters are plain values evaluated by backends; [`CustomerFilter::matches`]
//! and [`PaymentFilter::matches`] are the reference semantics every backend
//! must reproduce.

use crate::model::{Customer, PaymentRecord};
use crate::plan::{BillingStatus, PaymentPlan};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Customer search criteria. Empty filter matches everyone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerFilter {
    /// Case-insensitive substring of the name; blank terms are ignored.
    pub name: Option<String>,
    pub status: Option<BillingStatus>,
    pub payment_plan: Option<PaymentPlan>,
    /// Inclusive lower bound on the next due date.
    pub due_from: Option<NaiveDate>,
    /// Inclusive upper bound on the next due date.
    pub due_to: Option<NaiveDate>,
}

impl CustomerFilter {
    pub fn name(term: impl Into<String>) -> Self {
        CustomerFilter {
            name: Some(term.into()),
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

    pub fn with_due_between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.due_from = from;
        self.due_to = to;
        self
    }

    fn name_term(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, customer: &Customer) -> bool {
        if let Some(term) = self.name_term() {
            if !customer.name.to_lowercase().contains(&term) {
                return false;
            }
        }

        if let Some(status) = self.status {
            if customer.billing.status != status {
                return false;
            }
        }

        if let Some(plan) = &self.payment_plan {
            if &customer.payment_plan != plan {
                return false;
            }
        }

        if self.due_from.is_some() || self.due_to.is_some() {
            let Some(due) = customer.billing.next_due_date else {
                return false;
            };
            if self.due_from.is_some_and(|from| due < from) {
                return false;
            }
            if self.due_to.is_some_and(|to| due > to) {
                return false;
            }
        }

        true
    }
}

/// Payment history criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentFilter {
    pub customer_id: Option<Uuid>,
    /// Inclusive lower bound on the payment date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the payment date.
    pub to: Option<NaiveDate>,
    /// Maximum number of records; `None` means the caller's default.
    pub limit: Option<usize>,
}

impl PaymentFilter {
    pub fn for_customer(customer_id: Uuid) -> Self {
        PaymentFilter {
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &PaymentRecord) -> bool {
        if self.customer_id.is_some_and(|id| record.customer_id != id) {
            return false;
        }
        if self.from.is_some_and(|from| record.payment_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| record.payment_date > to) {
            return false;
        }
        true
    }
}

/// Newest payment first; ties broken by most recently recorded.
pub fn sort_newest_first(records: &mut [PaymentRecord]) {
    records.sort_by(|a, b| {
        b.payment_date
            .cmp(&a.payment_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Alphabetical by name, then serial number for a stable order.
pub fn sort_by_name(customers: &mut [Customer]) {
    customers.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.serial_number.cmp(&b.serial_number))
    });
}
