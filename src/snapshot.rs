//! Save and merge-load of whole instances.
//!
//! A [`Snapshot`] has exactly three sections: the index (schema descriptor
//! plus one radix tree per string property), the positional documents array
//! with tombstones as `null`, and the external to internal ID mapping.
//!
//! Loading validates the whole snapshot first, then remaps every foreign
//! internal ID to a fresh local one and re-inserts the postings, so a snapshot
//! can be merged into an instance that already holds documents. String
//! properties the target indexes but the snapshot does not are tokenized from
//! the merged documents with the target's own tokenizer.

use crate::engine::Database;
use crate::error::{Result, SiftError};
use crate::radix::NodeSnapshot;
use crate::schema::{Document, Schema};
use crate::types::{ExternalId, InternalId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Serialized state of a [`Database`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  /// Schema and per-property radix trees.
  pub index: IndexSnapshot,
  /// Documents by internal ID; `None` marks a tombstone.
  pub docs: Vec<Option<Document>>,
  /// External ID to internal ID.
  pub internal_ids: BTreeMap<ExternalId, InternalId>,
}

/// The index section of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
  /// Schema of the instance that produced the snapshot.
  pub schema: Schema,
  /// One entry per string property.
  pub fields: BTreeMap<String, FieldSnapshot>,
}

/// One property's radix tree and field lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
  /// Root of the radix tree.
  pub tree: NodeSnapshot,
  /// Token count of the property per internal ID.
  #[serde(default)]
  pub lengths: BTreeMap<InternalId, u32>,
}

impl Snapshot {
  /// Serializes the snapshot to JSON.
  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string(self)?)
  }

  /// Serializes the snapshot to indented JSON.
  pub fn to_json_pretty(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Parses a snapshot from JSON. Structure is checked on load, not here.
  pub fn from_json(json: &str) -> Result<Self> {
    Ok(serde_json::from_str(json)?)
  }

  fn is_live(&self, id: InternalId) -> bool {
    self
      .docs
      .get(id as usize)
      .is_some_and(|slot| slot.is_some())
  }
}

/// Captures the full state of `db`.
pub fn save(db: &Database) -> Snapshot {
  let fields = db
    .index
    .properties()
    .filter_map(|property| {
      let field = db.index.field(property)?;
      Some((
        property.to_string(),
        FieldSnapshot {
          tree: field.tree().to_snapshot(),
          lengths: field.lengths().clone(),
        },
      ))
    })
    .collect();

  let snapshot = Snapshot {
    index: IndexSnapshot {
      schema: db.schema.clone(),
      fields,
    },
    docs: db.docs.to_snapshot(),
    internal_ids: db.id_store.mapping(),
  };

  info!(
    documents = db.docs.count(),
    properties = snapshot.index.fields.len(),
    "saved snapshot"
  );
  snapshot
}

/// Merges `snapshot` into `db`.
///
/// External IDs that are live in `db` are skipped; their documents and
/// postings are left as they are. On error `db` is unchanged.
pub fn load(db: &mut Database, snapshot: &Snapshot) -> Result<()> {
  validate(db, snapshot)?;

  let table = db.id_store.remap_for_merge(
    &snapshot.internal_ids,
    |foreign| snapshot.is_live(foreign),
    |local| db.docs.is_live(local),
  );

  let mut entries: Vec<(InternalId, InternalId)> = table.iter().map(|(&f, &l)| (f, l)).collect();
  entries.sort_unstable();
  for &(foreign, local) in &entries {
    if let Some(Some(doc)) = snapshot.docs.get(foreign as usize) {
      db.docs.insert(local, doc.clone())?;
    }
  }

  let mut postings = 0;
  for (property, field) in &snapshot.index.fields {
    postings += db
      .index
      .merge_field(property, &field.tree, &field.lengths, |foreign| table.get(&foreign).copied())?;
  }

  let missing: Vec<String> = db
    .index
    .properties()
    .filter(|property| !snapshot.index.fields.contains_key(*property))
    .map(String::from)
    .collect();
  for property in &missing {
    for &(_, local) in &entries {
      if let Some(doc) = db.docs.get(local) {
        db.index
          .insert_property(property, local, doc, db.tokenizer.as_ref(), &db.language)?;
      }
    }
  }

  let incoming = snapshot.docs.iter().filter(|slot| slot.is_some()).count();
  info!(
    merged = table.len(),
    skipped = incoming - table.len(),
    postings,
    reindexed = missing.len(),
    "loaded snapshot"
  );
  Ok(())
}

/// Checks everything `load` relies on, without touching `db`.
fn validate(db: &Database, snapshot: &Snapshot) -> Result<()> {
  let mut mapped = HashSet::with_capacity(snapshot.internal_ids.len());
  for (external, &id) in &snapshot.internal_ids {
    if !mapped.insert(id) {
      return Err(SiftError::malformed(format!(
        "internal ID {id} is mapped twice (again by '{external}')"
      )));
    }
    if id as usize >= snapshot.docs.len() {
      return Err(SiftError::malformed(format!(
        "'{external}' maps to internal ID {id} beyond the {} document slots",
        snapshot.docs.len()
      )));
    }
  }

  for (index, slot) in snapshot.docs.iter().enumerate() {
    let Some(doc) = slot else {
      continue;
    };
    if !mapped.contains(&(index as InternalId)) {
      return Err(SiftError::malformed(format!(
        "document at position {index} has no external ID"
      )));
    }
    db.schema.validate(doc)?;
  }

  let declared: HashSet<String> = snapshot.index.schema.string_properties().into_iter().collect();
  for (property, field) in &snapshot.index.fields {
    if !declared.contains(property) {
      return Err(SiftError::malformed(format!(
        "indexed property '{property}' is not a string field of the snapshot schema"
      )));
    }
    if db.index.field(property).is_none() {
      return Err(SiftError::SchemaMismatch {
        field: property.clone(),
        expected: "string".to_string(),
        found: "no string property in target schema".to_string(),
      });
    }

    field.tree.validate()?;

    for (_, postings) in field.tree.terminals() {
      if let Some(id) = postings.keys().find(|&&id| !snapshot.is_live(id)) {
        return Err(SiftError::malformed(format!(
          "property '{property}' has a posting for missing document {id}"
        )));
      }
    }
    if let Some(id) = field.lengths.keys().find(|&&id| !snapshot.is_live(id)) {
      return Err(SiftError::malformed(format!(
        "property '{property}' has a field length for missing document {id}"
      )));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::parse_document;
  use crate::types::Query;
  use serde_json::json;

  fn people() -> Database {
    Database::new(Schema::builder().string("name").number("age").build())
  }

  fn with_names(names: &[&str]) -> Database {
    let mut db = people();
    for name in names {
      db.insert(parse_document(json!({ "id": name, "name": name })).unwrap())
        .unwrap();
    }
    db
  }

  fn assert_malformed(db: &mut Database, snapshot: &Snapshot) {
    let before = db.count();
    assert!(matches!(
      db.load(snapshot),
      Err(SiftError::MalformedSnapshot { .. })
    ));
    assert_eq!(db.count(), before);
  }

  #[test]
  fn test_save_has_positional_docs_with_tombstones() {
    let mut db = with_names(&["john", "jane"]);
    db.remove("john").unwrap();
    let snapshot = db.save();

    assert_eq!(snapshot.docs.len(), 2);
    assert!(snapshot.docs[0].is_none());
    assert!(snapshot.docs[1].is_some());
    assert_eq!(snapshot.internal_ids.get("jane"), Some(&1));
  }

  #[test]
  fn test_json_roundtrip() {
    let snapshot = with_names(&["john", "jane"]).save();
    let json = snapshot.to_json().unwrap();
    assert_eq!(Snapshot::from_json(&json).unwrap(), snapshot);

    let json: serde_json::Value = serde_json::from_str(&json).unwrap();
    let sections: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(sections, vec!["docs", "index", "internal_ids"]);
  }

  #[test]
  fn test_rejects_posting_to_tombstone() {
    let mut snapshot = with_names(&["john"]).save();
    snapshot.docs[0] = None;
    assert_malformed(&mut people(), &snapshot);
  }

  #[test]
  fn test_rejects_shared_internal_id() {
    let mut snapshot = with_names(&["john", "jane"]).save();
    snapshot.internal_ids.insert("jane".to_string(), 0);
    assert_malformed(&mut people(), &snapshot);
  }

  #[test]
  fn test_rejects_unmapped_document() {
    let mut snapshot = with_names(&["john"]).save();
    snapshot.internal_ids.clear();
    assert_malformed(&mut people(), &snapshot);
  }

  #[test]
  fn test_rejects_broken_tree_without_partial_merge() {
    let mut target = with_names(&["michele"]);
    let mut snapshot = with_names(&["paolo", "pietro"]).save();
    if let Some(field) = snapshot.index.fields.get_mut("name") {
      field.tree.children[0].key = "x".to_string();
    }

    assert_malformed(&mut target, &snapshot);
    assert_eq!(target.search(&Query::term("paolo")).unwrap().count, 0);
    assert_eq!(target.id_store.next_id(), 1);
  }

  #[test]
  fn test_rejects_incompatible_schema() {
    let snapshot = with_names(&["john"]).save();
    let mut target = Database::new(Schema::builder().number("name").build());
    assert!(matches!(
      target.load(&snapshot),
      Err(SiftError::SchemaMismatch { .. })
    ));
  }

  #[test]
  fn test_load_into_itself_is_a_no_op() {
    let mut db = with_names(&["john", "jane"]);
    let snapshot = db.save();
    db.load(&snapshot).unwrap();

    assert_eq!(db.count(), 2);
    assert_eq!(db.id_store.next_id(), 2);
    assert_eq!(db.save(), snapshot);
  }

  #[test]
  fn test_field_lengths_survive_roundtrip() {
    let source = with_names(&["john", "jane"]);
    let mut target = people();
    target.load(&source.save()).unwrap();

    let field = target.index().field("name").unwrap();
    assert_eq!(field.average_length(), 1.0);
    assert_eq!(field.lengths().len(), 2);
  }
}
