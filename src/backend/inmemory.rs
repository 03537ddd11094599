//! In-memory ledger backend (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Also the place where whole-ledger snapshots are exported and restored.

use super::LedgerBackend;
use crate::entity::LedgerDocument;
use crate::error::{Error, Result};
use crate::filter::{sort_newest_first, CustomerFilter, PaymentFilter};
use crate::model::{Customer, PaymentRecord};
use crate::plan::BillingStatus;
use crate::serialization::{deserialize_document, serialize_document};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Every customer and payment record, as written to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub customers: Vec<Customer>,
    pub payments: Vec<PaymentRecord>,
}

/// Thread-safe async in-memory ledger.
///
/// Customers and payment records live in separate DashMaps; a third map
/// reserves serial numbers so duplicates are rejected atomically.
///
/// # Example
///
/// ```no_run
/// use billing_kit::backend::{InMemoryBackend, LedgerBackend};
/// use billing_kit::model::Customer;
/// use billing_kit::plan::PaymentPlan;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     let customer = Customer::new(
///         "S-1".to_string(),
///         "Asha".to_string(),
///         PaymentPlan::Monthly,
///         chrono::Utc::now(),
///     );
///     backend.insert_customer(&customer).await?;
///
///     let found = backend.fetch_customer(customer.id).await?;
///     assert!(found.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    customers: Arc<DashMap<Uuid, Customer>>,
    serials: Arc<DashMap<String, Uuid>>,
    payments: Arc<DashMap<Uuid, PaymentRecord>>,
}

impl InMemoryBackend {
    /// Create a new empty in-memory ledger.
    pub fn new() -> Self {
        InMemoryBackend {
            customers: Arc::new(DashMap::new()),
            serials: Arc::new(DashMap::new()),
            payments: Arc::new(DashMap::new()),
        }
    }

    /// Current size of the ledger.
    pub async fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats {
            customers: self.customers.len(),
            payments: self.payments.len(),
            ..Default::default()
        };
        for entry in self.customers.iter() {
            match entry.billing.status {
                BillingStatus::Paid => stats.paid += 1,
                BillingStatus::DueButActive => stats.due_but_active += 1,
                BillingStatus::Overdue => stats.overdue += 1,
            }
        }
        stats
    }

    /// Print ledger statistics to debug log.
    pub async fn log_stats(&self) {
        let stats = self.stats().await;
        debug!(
            "Ledger Stats: {} customers ({} paid, {} due, {} overdue), {} payment records",
            stats.customers, stats.paid, stats.due_but_active, stats.overdue, stats.payments
        );
    }

    /// Encode every customer and payment record into one enveloped blob.
    ///
    /// # Errors
    /// Returns `Error::SerializationError` if encoding fails.
    pub async fn export_snapshot(&self) -> Result<Vec<u8>> {
        let snapshot = LedgerSnapshot {
            customers: self.customers.iter().map(|e| e.value().clone()).collect(),
            payments: self.payments.iter().map(|e| e.value().clone()).collect(),
        };
        let bytes = serialize_document(&snapshot)?;
        info!(
            "✓ Snapshot exported: {} customers, {} payment records ({} bytes)",
            snapshot.customers.len(),
            snapshot.payments.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Replace the whole ledger with the contents of a snapshot.
    ///
    /// The snapshot is decoded and validated before anything is replaced;
    /// a bad snapshot leaves the current ledger untouched.
    ///
    /// # Errors
    /// - `Error::InvalidSnapshot` / `Error::VersionMismatch` /
    ///   `Error::DeserializationError` for unreadable bytes
    /// - `Error::ValidationError` if a customer breaks an invariant
    /// - `Error::Conflict` if the snapshot repeats a serial number
    pub async fn restore_snapshot(&self, bytes: &[u8]) -> Result<LedgerStats> {
        let snapshot: LedgerSnapshot = deserialize_document(bytes)?;

        let mut serials = std::collections::HashMap::with_capacity(snapshot.customers.len());
        for customer in &snapshot.customers {
            customer.validate()?;
            if serials
                .insert(customer.serial_number.clone(), customer.id)
                .is_some()
            {
                return Err(Error::Conflict(format!(
                    "Snapshot repeats serial number {}",
                    customer.serial_number
                )));
            }
        }

        self.customers.clear();
        self.serials.clear();
        self.payments.clear();

        for (serial, id) in serials {
            self.serials.insert(serial, id);
        }
        for customer in snapshot.customers {
            self.customers.insert(customer.id, customer);
        }
        for record in snapshot.payments {
            self.payments.insert(record.id, record);
        }

        warn!("⚠ Ledger replaced from snapshot");
        Ok(self.stats().await)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerBackend for InMemoryBackend {
    async fn fetch_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let found = self.customers.get(&id).map(|entry| entry.value().clone());
        debug!(
            "✓ InMemory GET customer {} -> {}",
            id,
            if found.is_some() { "HIT" } else { "MISS" }
        );
        Ok(found)
    }

    async fn fetch_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let customers: Vec<Customer> = self
            .customers
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        debug!("✓ InMemory SCAN customers -> {} matches", customers.len());
        Ok(customers)
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        customer.validate()?;

        if self.customers.contains_key(&customer.id) {
            return Err(Error::Conflict(format!(
                "Customer id {} already exists",
                customer.id
            )));
        }

        match self.serials.entry(customer.serial_number.clone()) {
            Entry::Occupied(_) => {
                return Err(Error::Conflict(format!(
                    "Serial number {} already exists",
                    customer.serial_number
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(customer.id);
            }
        }

        self.customers.insert(customer.id, customer.clone());
        debug!("✓ InMemory INSERT customer {}", customer.id);
        Ok(())
    }

    async fn save_customer(&self, customer: &Customer) -> Result<()> {
        customer.validate()?;

        let mut stored = self
            .customers
            .get_mut(&customer.id)
            .ok_or_else(|| Error::customer_not_found(customer.id))?;

        if stored.serial_number != customer.serial_number {
            match self.serials.entry(customer.serial_number.clone()) {
                Entry::Occupied(owner) if *owner.get() != customer.id => {
                    return Err(Error::Conflict(format!(
                        "Serial number {} already exists",
                        customer.serial_number
                    )));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(customer.id);
                }
            }
            self.serials.remove(&stored.serial_number);
        }

        *stored = customer.clone();
        debug!("✓ InMemory SAVE customer {}", customer.id);
        Ok(())
    }

    async fn delete_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let removed = self.customers.remove(&id).map(|(_, customer)| customer);
        if let Some(customer) = &removed {
            self.serials
                .remove_if(&customer.serial_number, |_, owner| *owner == id);
        }
        debug!("✓ InMemory DELETE customer {}", id);
        Ok(removed)
    }

    async fn reset_billing(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut updated = 0;
        for mut entry in self.customers.iter_mut() {
            if !entry.billing.is_reset() {
                entry.billing.reset();
                entry.updated_at = now;
                updated += 1;
            }
        }
        warn!("⚠ InMemory RESET billing state of {} customers", updated);
        Ok(updated)
    }

    async fn insert_payment(&self, record: &PaymentRecord) -> Result<()> {
        match self.payments.entry(record.id) {
            Entry::Occupied(_) => Err(Error::Conflict(format!(
                "Payment id {} already exists",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                debug!(
                    "✓ InMemory INSERT payment {} for customer {}",
                    record.id, record.customer_id
                );
                Ok(())
            }
        }
    }

    async fn fetch_payment(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        Ok(self.payments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn query_payments(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRecord>> {
        let mut records: Vec<PaymentRecord> = self
            .payments
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        sort_newest_first(&mut records);
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }

        debug!("✓ InMemory QUERY payments -> {} records", records.len());
        Ok(records)
    }

    async fn mark_payment_paid(&self, id: Uuid) -> Result<Option<PaymentRecord>> {
        let updated = self.payments.get_mut(&id).map(|mut entry| {
            entry.status_at_payment = BillingStatus::Paid;
            entry.value().clone()
        });
        debug!("✓ InMemory MARK_PAID payment {}", id);
        Ok(updated)
    }

    async fn delete_payments_for(&self, customer_id: Uuid) -> Result<u64> {
        let before = self.payments.len();
        self.payments
            .retain(|_, record| record.customer_id != customer_id);
        let deleted = before.saturating_sub(self.payments.len()) as u64;
        debug!(
            "✓ InMemory DELETE {} payments of customer {}",
            deleted, customer_id
        );
        Ok(deleted)
    }

    async fn delete_all_payments(&self) -> Result<u64> {
        let deleted = self.payments.len() as u64;
        self.payments.clear();
        warn!("⚠ InMemory DELETE_ALL payments - {} records removed!", deleted);
        Ok(deleted)
    }

    async fn count_customers(&self) -> Result<u64> {
        Ok(self.customers.len() as u64)
    }

    async fn health_check(&self) -> Result<bool> {
        // In-memory backend is always healthy
        Ok(true)
    }
}

/// Ledger statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub customers: usize,
    pub payments: usize,
    pub paid: usize,
    pub due_but_active: usize,
    pub overdue: usize,
}
