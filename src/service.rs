//! High-level billing service for request layers.
//!
//! Provides the full operation surface over a [`PaymentRecorder`] wrapped in
//! `Arc` for easy sharing.

use crate::backend::LedgerBackend;
use crate::dashboard::DashboardStats;
use crate::error::{Error, Result};
use crate::filter::{sort_by_name, CustomerFilter, PaymentFilter};
use crate::model::{
    Customer, CustomerSummary, DeletedCustomer, NewCustomer, PaymentOutcome, PaymentRecord,
    PaymentUpdate, PaymentWithCustomer, ProfileUpdate, ResetSummary,
};
use crate::observability::LedgerMetrics;
use crate::recorder::PaymentRecorder;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// High-level billing service for web applications.
///
/// Wraps `PaymentRecorder` in `Arc` so handlers can clone the service
/// without any external `Arc<Mutex<>>`.
///
/// # Design
///
/// Backends use interior mutability and the recorder serializes writes per
/// customer, so every method takes `&self`.
///
/// # Example
///
/// ```
/// use billing_kit::{BillingService, backend::InMemoryBackend};
/// use billing_kit::model::NewCustomer;
///
/// # #[tokio::main]
/// # async fn main() -> billing_kit::Result<()> {
/// let billing = BillingService::new(InMemoryBackend::new());
/// let handle = billing.clone();
///
/// let customer = handle.create_customer(NewCustomer::new("Asha")).await?;
/// assert_eq!(billing.get_customer(customer.id).await?.name, "Asha");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BillingService<B: LedgerBackend> {
    recorder: Arc<PaymentRecorder<B>>,
}

impl<B: LedgerBackend> BillingService<B> {
    /// Create a new billing service with the given backend.
    pub fn new(backend: B) -> Self {
        Self::from_recorder(PaymentRecorder::new(backend))
    }

    /// Create a new billing service with custom metrics.
    pub fn with_metrics(backend: B, metrics: Box<dyn LedgerMetrics>) -> Self {
        Self::from_recorder(PaymentRecorder::new(backend).with_metrics(metrics))
    }

    /// Wrap a fully configured recorder (clock, metrics, config).
    pub fn from_recorder(recorder: PaymentRecorder<B>) -> Self {
        BillingService {
            recorder: Arc::new(recorder),
        }
    }

    /// Get a reference to the underlying recorder.
    pub fn recorder(&self) -> &PaymentRecorder<B> {
        &self.recorder
    }

    fn backend(&self) -> &B {
        self.recorder.backend()
    }

    /// Read view of a customer: derived for today when `derive_on_read` is on.
    fn present(&self, customer: Customer) -> Customer {
        if !self.recorder.config().derive_on_read {
            return customer;
        }
        let mut view = customer;
        view.billing = view.billing.derived(self.recorder.today());
        view
    }

    async fn require_customer(&self, id: Uuid) -> Result<Customer> {
        self.backend()
            .fetch_customer(id)
            .await?
            .ok_or_else(|| Error::customer_not_found(id))
    }

    // ========================================================================
    // Customers
    // ========================================================================

    /// See [`PaymentRecorder::create_customer`].
    pub async fn create_customer(&self, input: NewCustomer) -> Result<Customer> {
        self.recorder.create_customer(input).await
    }

    /// Fetch one customer.
    ///
    /// # Errors
    /// - `Error::NotFound` if the customer does not exist
    /// - `Error::StorageError` if the backend fails
    pub async fn get_customer(&self, id: Uuid) -> Result<Customer> {
        let customer = self.require_customer(id).await?;
        Ok(self.present(customer))
    }

    /// Every customer, alphabetical by name.
    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        self.search_customers(&CustomerFilter::default()).await
    }

    /// Customers matching `filter`, alphabetical by name.
    ///
    /// Status filters match the stored status.
    pub async fn search_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let mut customers = self.backend().fetch_customers(filter).await?;
        sort_by_name(&mut customers);
        Ok(customers.into_iter().map(|c| self.present(c)).collect())
    }

    /// See [`PaymentRecorder::record_payment`].
    pub async fn record_payment(
        &self,
        id: Uuid,
        update: PaymentUpdate,
    ) -> Result<PaymentOutcome> {
        self.recorder.record_payment(id, update).await
    }

    /// See [`PaymentRecorder::update_profile`].
    pub async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Customer> {
        self.recorder.update_profile(id, update).await
    }

    /// Delete a customer together with its payment history.
    ///
    /// # Errors
    /// - `Error::NotFound` if the customer does not exist
    /// - `Error::StorageError` if the backend fails
    pub async fn delete_customer(&self, id: Uuid) -> Result<DeletedCustomer> {
        let _guard = self.recorder.lock_customer(id).await;

        self.require_customer(id).await?;
        let records_deleted = self.backend().delete_payments_for(id).await?;
        let customer = self
            .backend()
            .delete_customer(id)
            .await?
            .ok_or_else(|| Error::customer_not_found(id))?;

        info!(
            "✓ Customer {} deleted with {} payment records",
            customer.serial_number, records_deleted
        );
        Ok(DeletedCustomer {
            customer,
            records_deleted,
        })
    }

    /// Administrative reset of every customer's billing state.
    ///
    /// Dates are cleared and status set to Due but Active without running the
    /// derivation. With `clear_history` every payment record is deleted too.
    /// Waits for customer writes in flight and holds off new ones until done.
    ///
    /// # Errors
    /// Returns `Error::StorageError` if the backend fails
    pub async fn reset_all_billing(&self, clear_history: bool) -> Result<ResetSummary> {
        let _all = self.recorder.lock_all().await;
        let now = self.recorder.now();
        warn!(
            "⚠ Resetting billing state of all customers (clear history: {})",
            clear_history
        );

        let result = if clear_history {
            futures::try_join!(
                self.backend().reset_billing(now),
                self.backend().delete_all_payments()
            )
        } else {
            self.backend().reset_billing(now).await.map(|n| (n, 0))
        };

        match result {
            Ok((customers_updated, records_deleted)) => {
                self.recorder
                    .metrics()
                    .record_reset(customers_updated, records_deleted);
                info!(
                    "✓ Billing reset: {} customers updated, {} records deleted",
                    customers_updated, records_deleted
                );
                Ok(ResetSummary {
                    customers_updated,
                    history_cleared: clear_history,
                    records_deleted,
                })
            }
            Err(e) => {
                self.recorder
                    .metrics()
                    .record_error("reset_all_billing", &e.to_string());
                Err(e)
            }
        }
    }

    // ========================================================================
    // Payment history
    // ========================================================================

    /// One customer's history, newest first.
    ///
    /// `limit` defaults to `history_limit` from the config.
    ///
    /// # Errors
    /// - `Error::NotFound` if the customer does not exist
    /// - `Error::StorageError` if the backend fails
    pub async fn payment_history(
        &self,
        customer_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<PaymentRecord>> {
        self.require_customer(customer_id).await?;
        let filter = PaymentFilter::for_customer(customer_id)
            .with_limit(limit.unwrap_or(self.recorder.config().history_limit));
        self.backend().query_payments(&filter).await
    }

    /// Payment records across all customers, joined with owner identity.
    ///
    /// `filter.limit` defaults to `payments_limit` from the config. Records
    /// whose customer was deleted carry `customer: None`.
    pub async fn all_payments(&self, filter: PaymentFilter) -> Result<Vec<PaymentWithCustomer>> {
        let limit = filter
            .limit
            .unwrap_or(self.recorder.config().payments_limit);
        let records = self
            .backend()
            .query_payments(&PaymentFilter {
                limit: Some(limit),
                ..filter
            })
            .await?;

        let mut owner_ids: Vec<Uuid> = records.iter().map(|r| r.customer_id).collect();
        owner_ids.sort_unstable();
        owner_ids.dedup();

        let owners: HashMap<Uuid, CustomerSummary> = self
            .backend()
            .fetch_customers_by_ids(&owner_ids)
            .await?
            .into_iter()
            .flatten()
            .map(|c| (c.id, c.summary()))
            .collect();

        Ok(records
            .into_iter()
            .map(|payment| PaymentWithCustomer {
                customer: owners.get(&payment.customer_id).cloned(),
                payment,
            })
            .collect())
    }

    /// Delete one customer's payment history; billing state is untouched.
    ///
    /// # Errors
    /// - `Error::NotFound` if the customer does not exist
    /// - `Error::StorageError` if the backend fails
    pub async fn clear_payment_history(&self, customer_id: Uuid) -> Result<u64> {
        let _guard = self.recorder.lock_customer(customer_id).await;
        self.require_customer(customer_id).await?;
        let deleted = self.backend().delete_payments_for(customer_id).await?;
        info!(
            "✓ Cleared {} payment records of customer {}",
            deleted, customer_id
        );
        Ok(deleted)
    }

    /// Reconcile a history record to Paid. Idempotent.
    ///
    /// # Errors
    /// - `Error::NotFound` if the record does not exist
    /// - `Error::StorageError` if the backend fails
    pub async fn mark_payment_paid(&self, payment_id: Uuid) -> Result<PaymentRecord> {
        self.backend()
            .mark_payment_paid(payment_id)
            .await?
            .ok_or_else(|| Error::payment_not_found(payment_id))
    }

    // ========================================================================
    // Dashboard / health
    // ========================================================================

    /// Dashboard counters as of the clock's today.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let customers = self
            .backend()
            .fetch_customers(&CustomerFilter::default())
            .await?;
        let config = self.recorder.config();
        Ok(DashboardStats::compute(
            &customers,
            self.recorder.today(),
            config.upcoming_window_days,
            config.upcoming_limit,
        ))
    }

    /// Backend reachability.
    pub async fn health_check(&self) -> Result<bool> {
        self.backend().health_check().await
    }
}
