//! # billing-kit
//!
//! Subscription billing state and payment ledger for Rust.
//!
//! ## Features
//!
//! - **Explicit derivation:** status and overdue days are recomputed from the
//!   due date at the end of every customer write, by one pure function
//! - **Backend Agnostic:** in-memory (DashMap) by default, Redis behind the
//!   `redis` feature, or any custom [`LedgerBackend`]
//! - **Testable time:** "today" comes from a [`clock::Clock`], never the wall
//!   clock directly
//! - **Serialized writers:** concurrent payments on one customer are applied
//!   one at a time; different customers proceed in parallel
//! - **Production Ready:** logging via `log`, metrics hooks, typed errors
//!
//! ## Quick Start
//!
//! ```
//! use billing_kit::{BillingService, backend::InMemoryBackend};
//! use billing_kit::model::{NewCustomer, PaymentUpdate};
//! use billing_kit::plan::{BillingStatus, PaymentPlan};
//! use chrono::NaiveDate;
//!
//! # #[tokio::main]
//! # async fn main() -> billing_kit::Result<()> {
//! let billing = BillingService::new(InMemoryBackend::new());
//!
//! // 1. Add a customer (no payment yet: Due but Active, no dates)
//! let customer = billing
//!     .create_customer(NewCustomer::new("Asha").with_plan(PaymentPlan::HalfYearly))
//!     .await?;
//!
//! // 2. Record a payment
//! let paid_on = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
//! let outcome = billing
//!     .record_payment(customer.id, PaymentUpdate::paid_on(paid_on))
//!     .await?;
//!
//! assert_eq!(
//!     outcome.customer.next_due_date(),
//!     NaiveDate::from_ymd_opt(2024, 7, 8)
//! );
//! assert_eq!(outcome.record.map(|r| r.amount), Some(1500));
//!
//! // 3. Clone freely - it's just an Arc
//! let handle = billing.clone();
//! let history = handle.payment_history(customer.id, None).await?;
//! assert_eq!(history.len(), 1);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod entity;
pub mod error;
pub mod filter;
pub mod key;
pub mod model;
pub mod observability;
pub mod plan;
pub mod recorder;
pub mod serialization;
pub mod service;

// Re-exports for convenience
pub use backend::LedgerBackend;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::BillingConfig;
pub use engine::BillingEngine;
pub use entity::LedgerDocument;
pub use error::{Error, Result};
pub use plan::{BillingStatus, PaymentPlan};
pub use recorder::{CustomerLock, PaymentRecorder};
pub use service::BillingService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
