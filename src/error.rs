//! Error types for the billing ledger.

use std::fmt;

/// Result type for billing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the billing ledger.
///
/// Every public operation returns `Result<T>`. The first three variants are the
/// ones a request layer normally maps to a response:
///
/// - `ValidationError` → the caller sent bad input, retrying will not help
/// - `NotFound` → the customer or payment id does not exist
/// - `StorageError` → the backend failed; the caller decides whether to retry
///
/// The ledger never retries internally.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Missing or invalid input, or a write that would break a billing invariant.
    ///
    /// Raised when:
    /// - A customer name is blank after trimming
    /// - An explicit status contradicts the billing state (e.g. `Overdue`
    ///   with no due date)
    /// - A configured value is out of range
    ValidationError(String),

    /// Unknown customer or payment record.
    NotFound {
        /// Entity kind, e.g. `"customer"` or `"payment"`
        entity: &'static str,
        /// The identifier that was looked up
        id: String,
    },

    /// The persistence layer failed.
    ///
    /// Common causes:
    /// - Redis connection lost or pool exhausted
    /// - Network timeout
    /// - Backend protocol error
    ///
    /// **Recovery:** surfaced unchanged; the caller decides on retry.
    StorageError(String),

    /// A uniqueness constraint in the store was violated.
    ///
    /// Raised for duplicate customer ids, payment ids, or serial numbers.
    Conflict(String),

    /// Encoding a document or snapshot failed.
    SerializationError(String),

    /// Decoding a document or snapshot failed (truncated or malformed payload).
    DeserializationError(String),

    /// Bytes handed to the snapshot/document decoder are not a billing-kit envelope.
    InvalidSnapshot(String),

    /// Schema version mismatch between code and stored data.
    ///
    /// Raised when `CURRENT_SCHEMA_VERSION` changed since the document or
    /// snapshot was written.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from stored bytes)
        found: u32,
    },

    /// Invalid configuration (malformed environment value, bad connection string).
    ConfigError(String),

    /// Operation not supported by this backend.
    NotImplemented(String),
}

impl Error {
    /// Shorthand for a missing customer.
    pub fn customer_not_found(id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: "customer",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing payment record.
    pub fn payment_not_found(id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: "payment",
            id: id.to_string(),
        }
    }

    /// True for `NotFound` errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::NotFound { entity, id } => write!(f, "Not found: {} {}", entity, id),
            Error::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Error::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidSnapshot(msg) => write!(f, "Invalid snapshot: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Schema version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::StorageError(e.to_string())
        } else if e.is_syntax() || e.is_data() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StorageError(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::StorageError(format!("Redis error: {}", e))
    }
}
