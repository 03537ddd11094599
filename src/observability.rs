//! Observability hooks for ledger operations.
//!
//! Implement [`LedgerMetrics`] to feed billing events into your monitoring
//! system:
//!
//! ```
//! use billing_kit::observability::LedgerMetrics;
//! use billing_kit::plan::BillingStatus;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct CountingMetrics {
//!     payments: AtomicU64,
//! }
//!
//! impl LedgerMetrics for CountingMetrics {
//!     fn record_payment(&self, _customer: &str, _amount: u32, _duration: Duration) {
//!         self.payments.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let metrics = CountingMetrics::default();
//! metrics.record_payment("c-1", 250, Duration::from_millis(3));
//! metrics.record_status_change("c-1", BillingStatus::Paid, BillingStatus::Overdue);
//! assert_eq!(metrics.payments.load(Ordering::Relaxed), 1);
//! ```
//!
//! Methods you do not override log through the `log` crate. [`NoOpMetrics`]
//! silences everything.
//!
//! # Hooks
//!
//! - `record_payment()` - A history record was appended
//! - `record_status_change()` - A save moved a customer to a different status
//! - `record_reset()` - Bulk billing reset finished
//! - `record_error()` - A ledger operation failed

use crate::plan::BillingStatus;
use std::time::Duration;

/// Trait for ledger metrics collection.
pub trait LedgerMetrics: Send + Sync {
    /// A payment record was appended for `customer`.
    fn record_payment(&self, customer: &str, amount: u32, duration: Duration) {
        debug!(
            "Ledger PAYMENT: customer {} amount {} took {:?}",
            customer, amount, duration
        );
    }

    /// A save changed the stored status of `customer`.
    fn record_status_change(&self, customer: &str, from: BillingStatus, to: BillingStatus) {
        debug!("Ledger STATUS: customer {} {} -> {}", customer, from, to);
    }

    /// A bulk reset completed.
    fn record_reset(&self, customers_updated: u64, records_deleted: u64) {
        debug!(
            "Ledger RESET: {} customers, {} records deleted",
            customers_updated, records_deleted
        );
    }

    /// An operation failed.
    fn record_error(&self, operation: &str, error: &str) {
        warn!("Ledger ERROR in {}: {}", operation, error);
    }
}

/// Metrics sink that discards everything.
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl LedgerMetrics for NoOpMetrics {
    fn record_payment(&self, _customer: &str, _amount: u32, _duration: Duration) {}
    fn record_status_change(&self, _customer: &str, _from: BillingStatus, _to: BillingStatus) {}
    fn record_reset(&self, _customers_updated: u64, _records_deleted: u64) {}
    fn record_error(&self, _operation: &str, _error: &str) {}
}

/// Metrics sink that only logs (the trait defaults).
#[derive(Clone, Default)]
pub struct LogMetrics;

impl LedgerMetrics for LogMetrics {}
