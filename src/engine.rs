//! Billing engine: due-date arithmetic and status derivation.
//!
//! Everything here is pure and deterministic. "Today" is always a parameter.
//!
//! # Derivation
//!
//! [`BillingEngine::derive_status`] is the recomputation rule applied at the
//! end of every customer write:
//!
//! ```text
//! nextDueDate == null          → keep stored status/daysOverdue
//! nextDueDate <  today         → Overdue, daysOverdue = today - nextDueDate
//! nextDueDate >= today, Paid   → Paid, 0
//! nextDueDate >= today, other  → Due but Active, 0
//! ```
//!
//! It is the only way a customer becomes Overdue through the passage of time.
//!
//! # Example
//!
//! ```
//! use billing_kit::engine::{BillingEngine, StatusDerivation};
//! use billing_kit::plan::{BillingStatus, PaymentPlan};
//! use chrono::NaiveDate;
//!
//! let paid_on = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let due = BillingEngine::compute_next_due_date(&PaymentPlan::Monthly, paid_on)?;
//! assert_eq!(due, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
//!
//! let today = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap();
//! let derived = BillingEngine::derive_status(Some(due), StatusDerivation::paid(), today);
//! assert_eq!(derived.status, BillingStatus::Overdue);
//! assert_eq!(derived.days_overdue, 3);
//! # Ok::<(), billing_kit::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::plan::{BillingStatus, PaymentPlan};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Status and overdue count, as stored on a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDerivation {
    pub status: BillingStatus,
    pub days_overdue: u32,
}

impl StatusDerivation {
    pub fn new(status: BillingStatus, days_overdue: u32) -> Self {
        StatusDerivation {
            status,
            days_overdue,
        }
    }

    pub fn paid() -> Self {
        Self::new(BillingStatus::Paid, 0)
    }

    pub fn due_but_active() -> Self {
        Self::new(BillingStatus::DueButActive, 0)
    }
}

/// Pure billing rules.
pub struct BillingEngine;

impl BillingEngine {
    /// Add one billing period of `plan` to `from`.
    ///
    /// Plain calendar-day arithmetic: Monthly +30, Half-Yearly +180,
    /// Yearly +365, anything else +30.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if the result falls outside the
    /// representable calendar.
    pub fn compute_next_due_date(plan: &PaymentPlan, from: NaiveDate) -> Result<NaiveDate> {
        from.checked_add_signed(Duration::days(plan.period_days()))
            .ok_or_else(|| {
                Error::ValidationError(format!(
                    "{} is too far in the future to add a {} period",
                    from, plan
                ))
            })
    }

    /// Whole days `next_due` lies before `today`, floored at zero.
    pub fn days_overdue(next_due: NaiveDate, today: NaiveDate) -> u32 {
        let days = (today - next_due).num_days().max(0);
        u32::try_from(days).unwrap_or(u32::MAX)
    }

    /// Recompute status and overdue count from the due date.
    ///
    /// Never fails; a missing due date leaves `current` untouched.
    pub fn derive_status(
        next_due: Option<NaiveDate>,
        current: StatusDerivation,
        today: NaiveDate,
    ) -> StatusDerivation {
        let Some(due) = next_due else {
            return current;
        };

        if due < today {
            StatusDerivation::new(BillingStatus::Overdue, Self::days_overdue(due, today))
        } else if current.status == BillingStatus::Paid {
            StatusDerivation::paid()
        } else {
            StatusDerivation::due_but_active()
        }
    }

    /// Grace advancement: push a stale due date forward by exactly one period.
    ///
    /// Only the explicit "mark Due but Active" path calls this; passive
    /// derivation never moves a due date.
    pub fn advance_overdue_due_date(
        plan: &PaymentPlan,
        stale_next_due: NaiveDate,
    ) -> Result<NaiveDate> {
        Self::compute_next_due_date(plan, stale_next_due)
    }

    /// Amount charged for a payment recorded under `plan`.
    pub fn payment_amount(plan: &PaymentPlan) -> u32 {
        plan.amount()
    }
}
