//! Dashboard counters and the upcoming-due projection.

use crate::filter::CustomerFilter;
use crate::model::Customer;
use crate::plan::{BillingStatus, PaymentPlan};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer whose due date falls inside the upcoming window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingDue {
    pub id: Uuid,
    pub name: String,
    pub serial_number: String,
    pub next_due_date: NaiveDate,
    pub status: BillingStatus,
    pub payment_plan: PaymentPlan,
}

/// Counts by stored status plus the customers coming due soon.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_customers: usize,
    pub paid_customers: usize,
    pub due_customers: usize,
    pub overdue_customers: usize,
    pub upcoming_due: Vec<UpcomingDue>,
}

impl DashboardStats {
    /// Build the dashboard from a full customer listing.
    ///
    /// Counts use the stored status as-is. Upcoming entries are customers not
    /// marked Paid whose next due date lies in `[today, today + window_days]`,
    /// earliest first, at most `limit` of them.
    pub fn compute(
        customers: &[Customer],
        today: NaiveDate,
        window_days: u32,
        limit: usize,
    ) -> Self {
        let mut stats = DashboardStats {
            total_customers: customers.len(),
            ..Default::default()
        };

        for customer in customers {
            match customer.billing.status {
                BillingStatus::Paid => stats.paid_customers += 1,
                BillingStatus::DueButActive => stats.due_customers += 1,
                BillingStatus::Overdue => stats.overdue_customers += 1,
            }
        }

        // a window running past the calendar end covers everything after today
        let window_end = today
            .checked_add_days(Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MAX);
        let window = CustomerFilter::default().with_due_between(Some(today), Some(window_end));

        let mut upcoming: Vec<UpcomingDue> = customers
            .iter()
            .filter(|c| c.billing.status != BillingStatus::Paid && window.matches(c))
            .filter_map(|c| {
                c.billing.next_due_date.map(|due| UpcomingDue {
                    id: c.id,
                    name: c.name.clone(),
                    serial_number: c.serial_number.clone(),
                    next_due_date: due,
                    status: c.billing.status,
                    payment_plan: c.payment_plan.clone(),
                })
            })
            .collect();

        upcoming.sort_by(|a, b| {
            a.next_due_date
                .cmp(&b.next_due_date)
                .then_with(|| a.name.cmp(&b.name))
        });
        upcoming.truncate(limit);

        stats.upcoming_due = upcoming;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BillingState;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn customer(name: &str, due: Option<NaiveDate>, status: BillingStatus) -> Customer {
        let mut c = Customer::new(
            format!("S-{}", name),
            name.to_string(),
            PaymentPlan::Monthly,
            Utc::now(),
        );
        c.billing = BillingState {
            last_paid_date: None,
            next_due_date: due,
            status,
            days_overdue: 0,
        };
        c
    }

    #[test]
    fn test_counts_by_status() {
        let today = date(2024, 3, 1);
        let customers = vec![
            customer("a", Some(date(2024, 3, 20)), BillingStatus::Paid),
            customer("b", None, BillingStatus::DueButActive),
            customer("c", Some(date(2024, 2, 1)), BillingStatus::Overdue),
            customer("d", Some(date(2024, 2, 2)), BillingStatus::Overdue),
        ];

        let stats = DashboardStats::compute(&customers, today, 7, 20);
        assert_eq!(stats.total_customers, 4);
        assert_eq!(stats.paid_customers, 1);
        assert_eq!(stats.due_customers, 1);
        assert_eq!(stats.overdue_customers, 2);
    }

    #[test]
    fn test_upcoming_window_is_inclusive_and_skips_paid() {
        let today = date(2024, 3, 1);
        let customers = vec![
            customer("edge-end", Some(date(2024, 3, 8)), BillingStatus::DueButActive),
            customer("today", Some(today), BillingStatus::DueButActive),
            customer("paid", Some(date(2024, 3, 3)), BillingStatus::Paid),
            customer("late", Some(date(2024, 3, 9)), BillingStatus::DueButActive),
            customer("past", Some(date(2024, 2, 29)), BillingStatus::Overdue),
            customer("undated", None, BillingStatus::DueButActive),
        ];

        let stats = DashboardStats::compute(&customers, today, 7, 20);
        let names: Vec<_> = stats.upcoming_due.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["today", "edge-end"]);
    }

    #[test]
    fn test_upcoming_limit() {
        let today = date(2024, 3, 1);
        let customers: Vec<Customer> = (0..5)
            .map(|i| {
                customer(
                    &format!("c{}", i),
                    Some(date(2024, 3, 1 + i)),
                    BillingStatus::DueButActive,
                )
            })
            .collect();

        let stats = DashboardStats::compute(&customers, today, 7, 3);
        assert_eq!(stats.upcoming_due.len(), 3);
        assert_eq!(stats.upcoming_due[0].next_due_date, today);
    }

    #[test]
    fn test_unbounded_window_reaches_calendar_end() {
        let today = date(2024, 1, 1);
        assert!(DashboardStats::compute(&[], today, u32::MAX, 20)
            .upcoming_due
            .is_empty());

        let customers = vec![
            customer("far", Some(date(2999, 12, 31)), BillingStatus::DueButActive),
            customer("today", Some(today), BillingStatus::DueButActive),
        ];
        let stats = DashboardStats::compute(&customers, today, u32::MAX, 20);
        let names: Vec<_> = stats.upcoming_due.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["today", "far"]);
    }

    #[test]
    fn test_json_shape() {
        let today = date(2024, 3, 1);
        let customers = vec![customer("a", Some(today), BillingStatus::DueButActive)];
        let json = serde_json::to_value(DashboardStats::compute(&customers, today, 7, 20)).unwrap();
        assert_eq!(json["totalCustomers"], 1);
        assert_eq!(json["upcomingDue"][0]["serialNumber"], "S-a");
        assert_eq!(json["upcomingDue"][0]["status"], "Due but Active");
    }
}
