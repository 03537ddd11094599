//! Storage key construction for key-value backends.
//!
//! Layout:
//!
//! ```text
//! customer:{id}                 → enveloped Customer
//! customer:ids                  → set of customer ids
//! customer:serial:{serial}      → owning customer id (uniqueness guard)
//! payment:{id}                  → enveloped PaymentRecord
//! payment:ids                   → set of payment ids
//! payment:customer:{customer}   → set of payment ids owned by a customer
//! ```

use crate::entity::LedgerDocument;
use crate::model::{Customer, PaymentRecord};
use uuid::Uuid;

/// Builder for storage keys.
pub struct DocumentKey;

impl DocumentKey {
    /// Document key: `"{collection}:{id}"`.
    pub fn build<T: LedgerDocument>(id: &Uuid) -> String {
        format!("{}:{}", T::collection(), id)
    }

    /// Set of every id in a collection.
    pub fn index<T: LedgerDocument>() -> String {
        format!("{}:ids", T::collection())
    }

    /// Serial-number reservation for a customer.
    pub fn serial(serial_number: &str) -> String {
        format!("{}:serial:{}", Customer::collection(), serial_number)
    }

    /// Payment ids owned by one customer.
    pub fn payments_of(customer_id: &Uuid) -> String {
        format!("{}:customer:{}", PaymentRecord::collection(), customer_id)
    }
}
