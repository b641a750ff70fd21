//! Defines the extension system for Sift.

use crate::schema::Document;

/// Hooks that run around insert and remove.
///
/// Every method has a no-op default, so an extension only implements the
/// hooks it needs. Hooks run synchronously on the caller's thread, in
/// registration order, and the engine waits for each one before going on.
///
/// ## Failure semantics
///
/// - A failing `before_*` hook aborts the operation before any index or store
///   mutation; the instance is unchanged.
/// - A failing `after_*` hook is reported to the caller as
///   [`SiftError::Hook`](crate::error::SiftError::Hook), but the mutation it
///   follows has already been committed and is **not** rolled back. Remaining
///   `after_*` hooks still run.
///
/// # Examples
///
/// Rejecting documents without a title:
///
/// ```rust
/// use sift::prelude::*;
///
/// struct RequireTitle;
///
/// impl Extension for RequireTitle {
///     fn before_insert(&self, _id: &str, doc: &Document) -> Result<(), String> {
///         match doc.get("title") {
///             Some(_) => Ok(()),
///             None => Err("title is required".to_string()),
///         }
///     }
/// }
/// ```
pub trait Extension: Send + Sync {
  /// Called after validation, before the document is indexed.
  fn before_insert(&self, _id: &str, _doc: &Document) -> Result<(), String> {
    Ok(())
  }

  /// Called after the document has been indexed and stored.
  fn after_insert(&self, _id: &str, _doc: &Document) -> Result<(), String> {
    Ok(())
  }

  /// Called before the document's postings are removed.
  fn before_remove(&self, _id: &str, _doc: &Document) -> Result<(), String> {
    Ok(())
  }

  /// Called after the document has been removed and tombstoned.
  fn after_remove(&self, _id: &str, _doc: &Document) -> Result<(), String> {
    Ok(())
  }
}
