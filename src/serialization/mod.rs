//! Postcard-based document serialization with versioned envelopes.
//!
//! Used wherever ledger data leaves the process as bytes: documents in a
//! key-value backend and full ledger snapshots.
//!
//! # Format
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (4 bytes)│POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "BKIT"              u32                postcard::to_allocvec(T)
//! ```
//!
//! # Example
//!
//! ```rust
//! use billing_kit::serialization::{serialize_document, deserialize_document};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Receipt {
//!     number: u64,
//!     payer: String,
//! }
//!
//! # fn main() -> billing_kit::Result<()> {
//! let receipt = Receipt { number: 7, payer: "Asha".to_string() };
//! let bytes = serialize_document(&receipt)?;
//! let decoded: Receipt = deserialize_document(&bytes)?;
//! assert_eq!(receipt, decoded);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for billing-kit documents: b"BKIT"
pub const DOCUMENT_MAGIC: [u8; 4] = *b"BKIT";

/// Current schema version.
///
/// **CRITICAL:** Increment when a persisted type changes shape (fields added,
/// removed, reordered, retyped; enum variants changed). Postcard is not
/// self-describing, so old bytes cannot be read by new code.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around every persisted document.
///
/// ```rust
/// use billing_kit::serialization::DocumentEnvelope;
///
/// let envelope = DocumentEnvelope::new("data");
/// assert_eq!(envelope.magic, *b"BKIT");
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentEnvelope<T> {
    /// Magic header: must be b"BKIT"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    pub payload: T,
}

impl<T> DocumentEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            magic: DOCUMENT_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Serialize a value inside the envelope.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_document<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = DocumentEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        error!("Document serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize and validate an enveloped value.
///
/// Checks in order: envelope decodes, magic matches, version matches.
///
/// # Errors
///
/// - `Error::DeserializationError`: Corrupted or truncated bytes
/// - `Error::InvalidSnapshot`: Invalid magic header
/// - `Error::VersionMismatch`: Schema version mismatch
pub fn deserialize_document<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: DocumentEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        error!("Document deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != DOCUMENT_MAGIC {
        warn!(
            "Invalid document: expected magic {:?}, got {:?}",
            DOCUMENT_MAGIC, envelope.magic
        );
        return Err(Error::InvalidSnapshot(format!(
            "Invalid magic: expected {:?}, got {:?}",
            DOCUMENT_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Document version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}
