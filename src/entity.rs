//! Core trait for documents persisted by a ledger backend.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait implemented by every document a backend stores.
///
/// Backends use the collection name and id to build storage keys, and the
/// provided byte codec (versioned postcard envelope) for key-value stores.
///
/// # Example
///
/// ```
/// use billing_kit::entity::LedgerDocument;
/// use serde::{Deserialize, Serialize};
/// use uuid::Uuid;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct Invoice {
///     pub id: Uuid,
///     pub total: u32,
/// }
///
/// impl LedgerDocument for Invoice {
///     fn document_id(&self) -> Uuid {
///         self.id
///     }
///
///     fn collection() -> &'static str {
///         "invoice"
///     }
/// }
/// ```
pub trait LedgerDocument: Send + Sync + Serialize + for<'de> Deserialize<'de> + Clone {
    /// Unique id of the document within its collection.
    fn document_id(&self) -> Uuid;

    /// Collection name, used to namespace storage keys: `"{collection}:{id}"`.
    fn collection() -> &'static str;

    /// Encode for a key-value store.
    ///
    /// See `crate::serialization` for the envelope format.
    fn to_document_bytes(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_document(self)
    }

    /// Decode bytes written by [`LedgerDocument::to_document_bytes`].
    ///
    /// # Errors
    ///
    /// - `Error::InvalidSnapshot`: bad magic
    /// - `Error::VersionMismatch`: schema version changed
    /// - `Error::DeserializationError`: corrupted payload
    fn from_document_bytes(bytes: &[u8]) -> Result<Self> {
        let doc: Self = crate::serialization::deserialize_document(bytes)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Optional: check invariants after decoding and before saving.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: Uuid,
        body: String,
    }

    impl LedgerDocument for Note {
        fn document_id(&self) -> Uuid {
            self.id
        }

        fn collection() -> &'static str {
            "note"
        }

        fn validate(&self) -> Result<()> {
            if self.body.is_empty() {
                return Err(Error::ValidationError("empty note".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_document_bytes_roundtrip() {
        let note = Note {
            id: Uuid::now_v7(),
            body: "called customer".to_string(),
        };

        let bytes = note.to_document_bytes().unwrap();
        let decoded = Note::from_document_bytes(&bytes).unwrap();
        assert_eq!(decoded, note);
        assert_eq!(Note::collection(), "note");
    }

    #[test]
    fn test_decode_runs_validation() {
        let note = Note {
            id: Uuid::now_v7(),
            body: String::new(),
        };

        let bytes = note.to_document_bytes().unwrap();
        let result = Note::from_document_bytes(&bytes);
        assert!(matches!(result, Err(Error::ValidationError(_))));
    }
}
