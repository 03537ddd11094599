//! Payment recorder - every mutation of a customer goes through here.
//!
//! The recorder owns the write pipeline:
//!
//! ```text
//! lock(customer) → fetch → apply change → derive → check invariants → save
//!                                                           ↓
//!                                            append PaymentRecord (or roll back)
//! ```
//!
//! Derivation ([`BillingEngine::derive_status`]) runs as the last step before
//! every save, so an explicit status chosen by the operator can be overwritten
//! on the same write when it contradicts the due date. The one exception is
//! the grace advancement applied when an operator marks a stale customer
//! "Due but Active": the due date moves first, then derivation runs.
//!
//! Per-customer locks sit behind one recorder-wide gate. Customer writes hold
//! it shared; bulk operations such as the billing reset hold it exclusively
//! through [`PaymentRecorder::lock_all`].

use crate::backend::LedgerBackend;
use crate::clock::{Clock, SystemClock};
use crate::config::BillingConfig;
use crate::engine::BillingEngine;
use crate::entity::LedgerDocument;
use crate::error::{Error, Result};
use crate::model::{
    generate_serial_number, BillingState, Customer, NewCustomer, PaymentOutcome, PaymentRecord,
    PaymentUpdate, ProfileUpdate,
};
use crate::observability::{LedgerMetrics, NoOpMetrics};
use crate::plan::BillingStatus;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, RwLock, RwLockWriteGuard};
use uuid::Uuid;

/// Applies operator events to customers and keeps the history in step.
///
/// # Example
///
/// ```
/// use billing_kit::backend::InMemoryBackend;
/// use billing_kit::clock::FixedClock;
/// use billing_kit::model::{NewCustomer, PaymentUpdate};
/// use billing_kit::plan::{BillingStatus, PaymentPlan};
/// use billing_kit::recorder::PaymentRecorder;
/// use chrono::NaiveDate;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> billing_kit::Result<()> {
/// let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let recorder = PaymentRecorder::new(InMemoryBackend::new())
///     .with_clock(Arc::new(FixedClock::at_date(today)));
///
/// let customer = recorder
///     .create_customer(NewCustomer::new("Asha").with_plan(PaymentPlan::Yearly))
///     .await?;
/// assert_eq!(customer.status(), BillingStatus::DueButActive);
///
/// let outcome = recorder
///     .record_payment(customer.id, PaymentUpdate::paid_on(today))
///     .await?;
/// assert_eq!(outcome.customer.status(), BillingStatus::Paid);
/// assert_eq!(outcome.record.map(|r| r.amount), Some(3000));
/// # Ok(())
/// # }
/// ```
pub struct PaymentRecorder<B: LedgerBackend> {
    backend: B,
    clock: Arc<dyn Clock>,
    metrics: Box<dyn LedgerMetrics>,
    config: BillingConfig,
    locks: LockSlots,
    gate: Arc<RwLock<()>>,
}

type LockSlots = Arc<DashMap<Uuid, Arc<Mutex<()>>>>;

/// Exclusive write access to one customer, released on drop.
///
/// Dropping the last holder of a slot removes it from the lock table, so
/// ids that were only looked up do not accumulate.
pub struct CustomerLock {
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    slots: LockSlots,
    _gate: OwnedRwLockReadGuard<()>,
}

impl CustomerLock {
    pub fn customer_id(&self) -> Uuid {
        self.id
    }
}

impl Drop for CustomerLock {
    fn drop(&mut self) {
        // the guard keeps its own reference to the slot
        self.guard.take();
        self.slots.remove_if(&self.id, |_, slot| Arc::strong_count(slot) == 1);
    }
}

impl<B: LedgerBackend> PaymentRecorder<B> {
    /// Create a recorder over `backend` using the wall clock.
    pub fn new(backend: B) -> Self {
        PaymentRecorder {
            backend,
            clock: Arc::new(SystemClock),
            metrics: Box::new(NoOpMetrics),
            config: BillingConfig::default(),
            locks: Arc::new(DashMap::new()),
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Set the source of "today".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn LedgerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_config(mut self, config: BillingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn metrics(&self) -> &dyn LedgerMetrics {
        self.metrics.as_ref()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Serialize writers of one customer.
    ///
    /// Hold the returned guard for the whole read-modify-write. Waits while a
    /// [`lock_all`](Self::lock_all) guard is alive.
    pub async fn lock_customer(&self, id: Uuid) -> CustomerLock {
        let gate = self.gate.clone().read_owned().await;
        let slot = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;
        CustomerLock {
            id,
            guard: Some(guard),
            slots: Arc::clone(&self.locks),
            _gate: gate,
        }
    }

    /// Block every customer write until the guard drops.
    ///
    /// Resolves once all writes in flight have finished.
    pub async fn lock_all(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    /// Number of customers with a lock slot held or awaited.
    pub fn locked_customers(&self) -> usize {
        self.locks.len()
    }

    /// Final pass of every customer write: derive, check, stamp.
    fn finish_write(
        &self,
        customer: &mut Customer,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        customer.billing.apply_derivation(today);
        customer.billing.check_invariants(today)?;
        customer.validate()?;
        customer.updated_at = now;
        Ok(())
    }

    fn report_status_change(&self, customer: &Customer, before: BillingStatus) {
        let after = customer.billing.status;
        if after != before {
            self.metrics
                .record_status_change(&customer.id.to_string(), before, after);
        }
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Create a customer.
    ///
    /// The billing state is seeded as Paid only when a first payment date is
    /// given (or `paid_today` asks for today's date); otherwise the customer
    /// starts Due but Active with no dates.
    ///
    /// # Errors
    /// - `Error::ValidationError` if the name is blank after trimming, or the
    ///   first payment date leaves no room for a due date on the calendar
    /// - `Error::Conflict` if an operator-supplied serial number is taken, or
    ///   every auto-generated attempt collided
    /// - `Error::StorageError` if the backend fails
    pub async fn create_customer(&self, input: NewCustomer) -> Result<Customer> {
        let _gate = self.gate.read().await;
        let result = self.create_customer_inner(input).await;
        if let Err(e) = &result {
            self.metrics.record_error("create_customer", &e.to_string());
        }
        result
    }

    async fn create_customer_inner(&self, input: NewCustomer) -> Result<Customer> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::ValidationError(
                "Customer name is required".to_string(),
            ));
        }

        let today = self.clock.today();
        let now = self.clock.now();
        let plan = input.payment_plan.clone().unwrap_or_default();
        let first_payment = input
            .first_payment_date
            .or_else(|| input.paid_today.then_some(today));

        let operator_serial = input
            .serial_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let attempts = if operator_serial.is_some() {
            1
        } else {
            self.config.serial_attempts.max(1)
        };

        let mut last_error = None;
        for attempt in 1..=attempts {
            let serial = operator_serial
                .clone()
                .unwrap_or_else(|| generate_serial_number(&self.config.serial_prefix, now));

            let mut customer = Customer::new(serial, name.clone(), plan.clone(), now);
            customer.notes = input
                .notes
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
            customer.contact = input.contact.trimmed();
            if let Some(paid_on) = first_payment {
                customer.billing = BillingState::paid_on(&plan, paid_on)?;
            }
            self.finish_write(&mut customer, today, now)?;

            match self.backend.insert_customer(&customer).await {
                Ok(()) => {
                    info!(
                        "✓ Customer created: {} ({}) status {}",
                        customer.serial_number, customer.id, customer.billing.status
                    );
                    return Ok(customer);
                }
                Err(Error::Conflict(msg)) if operator_serial.is_none() => {
                    warn!(
                        "⚠ Serial number collision (attempt {}/{}): {}",
                        attempt, attempts, msg
                    );
                    last_error = Some(Error::Conflict(msg));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::Conflict("Could not allocate a unique serial number".to_string())
        }))
    }

    // ========================================================================
    // Record payment
    // ========================================================================

    /// Apply a payment event and append its history record.
    ///
    /// Steps, in order:
    /// 1. a supplied plan replaces the customer's plan
    /// 2. a supplied payment date sets `lastPaidDate` and recomputes `nextDueDate`
    /// 3. a supplied status is set (Due but Active on a past due date advances
    ///    the due date one period); a date with no status means Paid
    /// 4. derivation, invariant check, save
    /// 5. if a date or status was supplied, one `PaymentRecord` is appended
    ///
    /// If step 5 fails the customer is written back to its previous state.
    ///
    /// # Errors
    /// - `Error::NotFound` if the customer does not exist
    /// - `Error::ValidationError` if the result would break a billing invariant
    ///   or a due date would fall past the end of the calendar
    /// - `Error::StorageError` if the backend fails
    pub async fn record_payment(&self, id: Uuid, update: PaymentUpdate) -> Result<PaymentOutcome> {
        let timer = Instant::now();
        let _guard = self.lock_customer(id).await;

        let result = self.record_payment_locked(id, update).await;
        match &result {
            Ok(outcome) => {
                if let Some(record) = &outcome.record {
                    self.metrics
                        .record_payment(&id.to_string(), record.amount, timer.elapsed());
                }
                info!(
                    "✓ Payment recorded for {} in {:?}: status {}",
                    id,
                    timer.elapsed(),
                    outcome.customer.billing.status
                );
            }
            Err(e) => self.metrics.record_error("record_payment", &e.to_string()),
        }
        result
    }

    async fn record_payment_locked(
        &self,
        id: Uuid,
        update: PaymentUpdate,
    ) -> Result<PaymentOutcome> {
        let today = self.clock.today();
        let now = self.clock.now();

        let stored = self
            .backend
            .fetch_customer(id)
            .await?
            .ok_or_else(|| Error::customer_not_found(id))?;
        let mut customer = stored.clone();

        // 1. plan
        if let Some(plan) = &update.payment_plan {
            customer.payment_plan = plan.clone();
        }

        // 2. payment date
        if let Some(paid_on) = update.payment_date {
            customer.billing.last_paid_date = Some(paid_on);
            customer.billing.next_due_date = Some(BillingEngine::compute_next_due_date(
                &customer.payment_plan,
                paid_on,
            )?);
        }

        // 3. explicit or implied status
        match update.status {
            Some(status) => {
                customer.billing.status = status;
                if status != BillingStatus::Overdue {
                    customer.billing.days_overdue = 0;
                }
                if status == BillingStatus::DueButActive {
                    if let Some(due) = customer.billing.next_due_date.filter(|due| *due < today) {
                        let advanced =
                            BillingEngine::advance_overdue_due_date(&customer.payment_plan, due)?;
                        debug!("Grace period for {}: due {} -> {}", id, due, advanced);
                        customer.billing.next_due_date = Some(advanced);
                    }
                }
            }
            None if update.payment_date.is_some() => {
                customer.billing.status = BillingStatus::Paid;
                customer.billing.days_overdue = 0;
            }
            None => {}
        }

        // 4. derive and persist
        self.finish_write(&mut customer, today, now)?;
        self.backend.save_customer(&customer).await?;
        self.report_status_change(&customer, stored.billing.status);

        // 5. history
        if !update.is_billing_event() {
            return Ok(PaymentOutcome {
                customer,
                record: None,
            });
        }

        let record = PaymentRecord::new(
            id,
            customer.payment_plan.clone(),
            update.status.unwrap_or(BillingStatus::Paid),
            update.payment_date.unwrap_or(today),
            update.note.as_deref().map(str::trim).unwrap_or_default().to_string(),
            now,
        );

        if let Err(e) = self.backend.insert_payment(&record).await {
            warn!(
                "⚠ Payment record for {} failed, restoring previous billing state: {}",
                id, e
            );
            if let Err(rollback) = self.backend.save_customer(&stored).await {
                error!("Rollback of customer {} failed: {}", id, rollback);
            }
            return Err(e);
        }

        Ok(PaymentOutcome {
            customer,
            record: Some(record),
        })
    }

    // ========================================================================
    // Profile edits
    // ========================================================================

    /// Edit name, plan, notes or contact details.
    ///
    /// Billing dates are never changed here and no history is written. The
    /// save still runs the derivation, so a customer whose due date passed
    /// since the last write is brought up to date.
    ///
    /// # Errors
    /// - `Error::NotFound` if the customer does not exist
    /// - `Error::ValidationError` if the new name is blank
    /// - `Error::StorageError` if the backend fails
    pub async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Customer> {
        let _guard = self.lock_customer(id).await;
        let result = self.update_profile_locked(id, update).await;
        if let Err(e) = &result {
            self.metrics.record_error("update_profile", &e.to_string());
        }
        result
    }

    async fn update_profile_locked(&self, id: Uuid, update: ProfileUpdate) -> Result<Customer> {
        let today = self.clock.today();
        let now = self.clock.now();

        let stored = self
            .backend
            .fetch_customer(id)
            .await?
            .ok_or_else(|| Error::customer_not_found(id))?;
        let mut customer = stored.clone();

        if let Some(name) = &update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::ValidationError(
                    "Customer name is required".to_string(),
                ));
            }
            customer.name = name.to_string();
        }
        if let Some(plan) = update.payment_plan {
            customer.payment_plan = plan;
        }
        if let Some(notes) = &update.notes {
            customer.notes = notes.trim().to_string();
        }
        if let Some(contact) = &update.contact {
            customer.contact = contact.trimmed();
        }

        self.finish_write(&mut customer, today, now)?;
        self.backend.save_customer(&customer).await?;
        self.report_status_change(&customer, stored.billing.status);

        debug!("✓ Profile updated for {}", id);
        Ok(customer)
    }
}
