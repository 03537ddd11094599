//! Ledger storage backends.
//!
//! The billing core only needs two contracts from storage: customers read and
//! written by id, and payment records inserted and queried by filter. Anything
//! that provides them can sit behind [`LedgerBackend`].

use crate::error::{Error, Result};
use crate::filter::{CustomerFilter, PaymentFilter};
use crate::model::{Customer, PaymentRecord};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::{InMemoryBackend, LedgerSnapshot, LedgerStats};
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Trait for ledger storage implementations.
///
/// Implementations: InMemory (default), Redis, or any document store.
///
/// **IMPORTANT:** All methods use `&self`. Backends use interior mutability
/// (DashMap, connection pools) so a single handle can be cloned and shared.
///
/// **ASYNC:** All methods are async and must be awaited.
///
/// Backends store what they are given: status derivation and billing rules
/// live above this trait, in the recorder.
#[allow(async_fn_in_trait)]
pub trait LedgerBackend: Send + Sync + Clone {
    /// Fetch a customer by id.
    ///
    /// # Returns
    /// - `Ok(Some(customer))` - Found
    /// - `Ok(None)` - No such customer (not an error at this layer)
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn fetch_customer(&self, id: Uuid) -> Result<Option<Customer>>;

    /// All customers matching `filter`, in no particular order.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn fetch_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>>;

    /// Batch fetch by ids (optional optimization).
    ///
    /// Default implementation calls `fetch_customer()` for each id.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn fetch_customers_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Option<Customer>>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.fetch_customer(*id).await?);
        }
        Ok(results)
    }

    /// Insert a new customer.
    ///
    /// # Errors
    /// - `Error::Conflict` if the id or serial number is already taken
    /// - `Error::StorageError` if the write fails
    async fn insert_customer(&self, customer: &Customer) -> Result<()>;

    /// Replace a stored customer in place.
    ///
    /// # Errors
    /// - `Error::NotFound` if the customer does not exist
    /// - `Error::Conflict` if the serial number belongs to another customer
    /// - `Error::StorageError` if the write fails
    async fn save_customer(&self, customer: &Customer) -> Result<()>;

    /// Remove a customer. Payment records are not touched here.
    ///
    /// # Returns
    /// The removed customer, or `None` if it did not exist.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn delete_customer(&self, id: Uuid) -> Result<Option<Customer>>;

    /// Clear the billing state of every customer unconditionally.
    ///
    /// Sets `lastPaidDate`/`nextDueDate` to null, status to Due but Active and
    /// `daysOverdue` to 0, bypassing derivation.
    ///
    /// # Returns
    /// Number of customers whose billing state actually changed.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn reset_billing(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Append a payment record.
    ///
    /// # Errors
    /// - `Error::Conflict` if the record id already exists
    /// - `Error::StorageError` if the write fails
    async fn insert_payment(&self, record: &PaymentRecord) -> Result<()>;

    /// Fetch a payment record by id.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn fetch_payment(&self, id: Uuid) -> Result<Option<PaymentRecord>>;

    /// Payment records matching `filter`, newest first, at most `filter.limit`.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn query_payments(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRecord>>;

    /// Set a record's status to Paid; the single permitted record mutation.
    ///
    /// # Returns
    /// The updated record, or `None` if it did not exist.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn mark_payment_paid(&self, id: Uuid) -> Result<Option<PaymentRecord>>;

    /// Delete every record owned by one customer.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn delete_payments_for(&self, customer_id: Uuid) -> Result<u64>;

    /// Delete every payment record.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable
    async fn delete_all_payments(&self) -> Result<u64>;

    /// Count customers (optional, for statistics).
    ///
    /// # Errors
    /// Returns `Err` if not implemented or if the backend fails
    async fn count_customers(&self) -> Result<u64> {
        Err(Error::NotImplemented(
            "count_customers not implemented for this backend".to_string(),
        ))
    }

    /// Health check - verify backend is accessible.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PaymentPlan;

    #[tokio::test]
    async fn test_fetch_customers_by_ids_default() {
        let backend = InMemoryBackend::new();
        let customer = Customer::new(
            "S-1".to_string(),
            "Asha".to_string(),
            PaymentPlan::Monthly,
            Utc::now(),
        );
        backend
            .insert_customer(&customer)
            .await
            .expect("Failed to insert");

        let results = backend
            .fetch_customers_by_ids(&[customer.id, Uuid::now_v7()])
            .await
            .expect("Failed to fetch batch");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().map(|c| c.id), Some(customer.id));
        assert!(results[1].is_none());
    }
}
