//! Error types for the Sift search engine.

use crate::types::InternalId;
use thiserror::Error;

/// Errors returned by engine operations.
///
/// Every variant is surfaced to the caller; nothing inside the engine retries
/// or swallows an error.
#[derive(Debug, Error)]
pub enum SiftError {
  /// A document value does not conform to the declared field type.
  #[error("Schema mismatch on '{field}': expected {expected}, found {found}")]
  SchemaMismatch {
    /// Dotted path of the offending property
    field: String,
    /// Declared type
    expected: String,
    /// Type of the value that was supplied
    found: String,
  },

  /// A property is not declared in the schema.
  #[error("Unknown field: {field}")]
  UnknownField {
    /// Dotted path of the property
    field: String,
  },

  /// The external document ID is unknown to this instance.
  #[error("Document not found: {id}")]
  NotFound {
    /// External document ID
    id: String,
  },

  /// A live document with this external ID already exists.
  #[error("Document already exists: {id}")]
  DuplicateId {
    /// External document ID
    id: String,
  },

  /// The documents store already holds a live document at this position.
  #[error("Document slot {internal_id} is already occupied")]
  SlotOccupied {
    /// Internal ID of the occupied slot
    internal_id: InternalId,
  },

  /// A snapshot failed structural validation. Nothing was merged.
  #[error("Malformed snapshot: {reason}")]
  MalformedSnapshot {
    /// What the validation pass found
    reason: String,
  },

  /// An extension hook returned an error.
  #[error("Hook '{hook}' failed: {message}")]
  Hook {
    /// Name of the hook that failed
    hook: &'static str,
    /// Message returned by the hook
    message: String,
  },

  /// Snapshot (de)serialization failed.
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl SiftError {
  pub(crate) fn malformed(reason: impl Into<String>) -> Self {
    SiftError::MalformedSnapshot {
      reason: reason.into(),
    }
  }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SiftError>;
