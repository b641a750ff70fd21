//! Bidirectional mapping between external and internal document IDs.

use crate::error::{Result, SiftError};
use crate::types::{ExternalId, InternalId};
use std::collections::{BTreeMap, HashMap};

/// Foreign internal ID to local internal ID, built for a merge-load.
pub type TranslationTable = HashMap<InternalId, InternalId>;

/// Maps caller-supplied document IDs to compact sequential integers.
///
/// Internal IDs are handed out from 0 upward and never reassigned to a
/// different external ID while the store lives. A removed document keeps its
/// mapping, so inserting the same external ID again revives the same slot.
#[derive(Debug, Clone, Default)]
pub struct InternalIdStore {
  next_id: InternalId,
  external_to_internal: HashMap<ExternalId, InternalId>,
  internal_to_external: Vec<ExternalId>,
}

impl InternalIdStore {
  /// Create an empty store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of mapped IDs, removed documents included.
  pub fn len(&self) -> usize {
    self.internal_to_external.len()
  }

  /// Returns `true` if no ID was ever mapped.
  pub fn is_empty(&self) -> bool {
    self.internal_to_external.is_empty()
  }

  /// The internal ID the next allocation will receive.
  pub fn next_id(&self) -> InternalId {
    self.next_id
  }

  /// Returns the existing internal ID for `external`, or allocates one.
  pub fn get_or_create(&mut self, external: &str) -> InternalId {
    if let Some(&id) = self.external_to_internal.get(external) {
      return id;
    }
    self.allocate(external)
  }

  /// Allocates an internal ID for an external ID that must not be mapped yet.
  pub fn create(&mut self, external: &str) -> Result<InternalId> {
    if self.external_to_internal.contains_key(external) {
      return Err(SiftError::DuplicateId {
        id: external.to_string(),
      });
    }
    Ok(self.allocate(external))
  }

  /// Looks up the internal ID of `external`.
  pub fn internal_id(&self, external: &str) -> Option<InternalId> {
    self.external_to_internal.get(external).copied()
  }

  /// Looks up the external ID of `internal`.
  pub fn external_id(&self, internal: InternalId) -> Option<&str> {
    self
      .internal_to_external
      .get(internal as usize)
      .map(String::as_str)
  }

  /// Builds the translation table for merging a foreign mapping into this one.
  ///
  /// Foreign entries are visited in ascending foreign internal ID order, so
  /// allocation is deterministic. An entry is skipped when `keep` rejects it
  /// or when its external ID already belongs to a live local document
  /// (`is_live`). An external ID known locally but not live reuses its local
  /// internal ID; an unknown one gets a fresh ID.
  pub fn remap_for_merge<K, L>(
    &mut self,
    foreign: &BTreeMap<ExternalId, InternalId>,
    keep: K,
    is_live: L,
  ) -> TranslationTable
  where
    K: Fn(InternalId) -> bool,
    L: Fn(InternalId) -> bool,
  {
    let mut entries: Vec<(&ExternalId, InternalId)> =
      foreign.iter().map(|(external, &id)| (external, id)).collect();
    entries.sort_by_key(|&(_, id)| id);

    let mut table = TranslationTable::with_capacity(entries.len());
    for (external, foreign_id) in entries {
      if !keep(foreign_id) {
        continue;
      }
      let local = match self.internal_id(external) {
        Some(local) if is_live(local) => continue,
        Some(local) => local,
        None => self.allocate(external),
      };
      table.insert(foreign_id, local);
    }
    table
  }

  /// Full external to internal mapping, sorted by external ID.
  pub fn mapping(&self) -> BTreeMap<ExternalId, InternalId> {
    self
      .external_to_internal
      .iter()
      .map(|(external, &id)| (external.clone(), id))
      .collect()
  }

  fn allocate(&mut self, external: &str) -> InternalId {
    let id = self.next_id;
    self.next_id += 1;
    self
      .external_to_internal
      .insert(external.to_string(), id);
    self.internal_to_external.push(external.to_string());
    id
  }
}
