//! Payment plans and billing statuses.
//!
//! Both enums render with the names operators see in the UI and that are
//! stored in existing data: `"Monthly"`, `"Half-Yearly"`, `"Yearly"` and
//! `"Paid"`, `"Due but Active"`, `"Overdue"`.
//!
//! # Compatibility table
//!
//! | Plan | Billing period | Amount |
//! |------|----------------|--------|
//! | Monthly | 30 days | 250 |
//! | Half-Yearly | 180 days | 1500 |
//! | Yearly | 365 days | 3000 |
//! | anything else | 30 days | 250 |
//!
//! The amount table is a compatibility contract with recorded history and must
//! not change.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription plan of a customer.
///
/// Values that are not one of the three known plans are kept verbatim in
/// `Unrecognized` so they survive a read/write cycle; they bill like Monthly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentPlan {
    #[default]
    Monthly,
    HalfYearly,
    Yearly,
    Unrecognized(String),
}

impl PaymentPlan {
    /// Known plans, in display order.
    pub const KNOWN: [PaymentPlan; 3] = [
        PaymentPlan::Monthly,
        PaymentPlan::HalfYearly,
        PaymentPlan::Yearly,
    ];

    /// Wire name of the plan.
    pub fn as_str(&self) -> &str {
        match self {
            PaymentPlan::Monthly => "Monthly",
            PaymentPlan::HalfYearly => "Half-Yearly",
            PaymentPlan::Yearly => "Yearly",
            PaymentPlan::Unrecognized(raw) => raw.as_str(),
        }
    }

    /// Length of one billing period in calendar days.
    pub fn period_days(&self) -> i64 {
        match self {
            PaymentPlan::Monthly => 30,
            PaymentPlan::HalfYearly => 180,
            PaymentPlan::Yearly => 365,
            PaymentPlan::Unrecognized(_) => 30,
        }
    }

    /// Fixed amount charged per recorded payment.
    pub fn amount(&self) -> u32 {
        match self {
            PaymentPlan::Monthly => 250,
            PaymentPlan::HalfYearly => 1500,
            PaymentPlan::Yearly => 3000,
            PaymentPlan::Unrecognized(_) => 250,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, PaymentPlan::Unrecognized(_))
    }
}

impl From<String> for PaymentPlan {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Monthly" => PaymentPlan::Monthly,
            "Half-Yearly" => PaymentPlan::HalfYearly,
            "Yearly" => PaymentPlan::Yearly,
            _ => PaymentPlan::Unrecognized(raw),
        }
    }
}

impl From<&str> for PaymentPlan {
    fn from(raw: &str) -> Self {
        PaymentPlan::from(raw.to_string())
    }
}

impl From<PaymentPlan> for String {
    fn from(plan: PaymentPlan) -> Self {
        match plan {
            PaymentPlan::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PaymentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing status of a customer, and the status snapshot on a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BillingStatus {
    Paid,
    #[default]
    #[serde(rename = "Due but Active")]
    DueButActive,
    Overdue,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Paid => "Paid",
            BillingStatus::DueButActive => "Due but Active",
            BillingStatus::Overdue => "Overdue",
        }
    }
}

impl FromStr for BillingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Paid" => Ok(BillingStatus::Paid),
            "Due but Active" | "DueButActive" => Ok(BillingStatus::DueButActive),
            "Overdue" => Ok(BillingStatus::Overdue),
            other => Err(Error::ValidationError(format!(
                "Unknown billing status: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_wire_names() {
        assert_eq!(PaymentPlan::from("Half-Yearly"), PaymentPlan::HalfYearly);
        assert_eq!(PaymentPlan::HalfYearly.as_str(), "Half-Yearly");
        assert_eq!(
            PaymentPlan::from("Quarterly"),
            PaymentPlan::Unrecognized("Quarterly".to_string())
        );
    }

    #[test]
    fn test_amount_table() {
        assert_eq!(PaymentPlan::Monthly.amount(), 250);
        assert_eq!(PaymentPlan::HalfYearly.amount(), 1500);
        assert_eq!(PaymentPlan::Yearly.amount(), 3000);
        assert_eq!(PaymentPlan::from("Weekly").amount(), 250);
    }

    #[test]
    fn test_unrecognized_plan_survives_json() {
        let plan = PaymentPlan::from("Lifetime");
        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(json, "\"Lifetime\"");
        let back: PaymentPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
        assert!(!back.is_recognized());
    }

    #[test]
    fn test_status_json_uses_display_names() {
        let json = serde_json::to_string(&BillingStatus::DueButActive).unwrap();
        assert_eq!(json, "\"Due but Active\"");
        let parsed: BillingStatus = "Due but Active".parse().unwrap();
        assert_eq!(parsed, BillingStatus::DueButActive);
        assert!("Cancelled".parse::<BillingStatus>().is_err());
    }

    #[test]
    fn test_default_status_is_due_but_active() {
        assert_eq!(BillingStatus::default(), BillingStatus::DueButActive);
        assert_eq!(PaymentPlan::default(), PaymentPlan::Monthly);
    }
}
