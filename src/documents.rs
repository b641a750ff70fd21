//! Dense documents store addressed by internal ID.

use crate::error::{Result, SiftError};
use crate::schema::Document;
use crate::types::InternalId;

/// Original documents, positioned by internal ID.
///
/// Removal leaves a tombstone (`None`) so that positions never shift.
#[derive(Debug, Clone, Default)]
pub struct DocumentsStore {
    docs: Vec<Option<Document>>,
    live: usize,
}

impl DocumentsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `doc` at position `id`. Fails if the slot holds a live document;
    /// a tombstoned slot may be refilled.
    pub fn insert(&mut self, id: InternalId, doc: Document) -> Result<()> {
        let index = id as usize;
        if index >= self.docs.len() {
            self.docs.resize(index + 1, None);
        }

        let slot = &mut self.docs[index];
        if slot.is_some() {
            return Err(SiftError::SlotOccupied { internal_id: id });
        }
        *slot = Some(doc);
        self.live += 1;
        Ok(())
    }

    /// Returns the live document at `id`.
    pub fn get(&self, id: InternalId) -> Option<&Document> {
        self.docs.get(id as usize).and_then(Option::as_ref)
    }

    /// Returns `true` if `id` holds a live document.
    pub fn is_live(&self, id: InternalId) -> bool {
        self.get(id).is_some()
    }

    /// Tombstones `id` and returns the removed document.
    pub fn remove(&mut self, id: InternalId) -> Option<Document> {
        let removed = self.docs.get_mut(id as usize)?.take();
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    /// Number of live documents.
    pub fn count(&self) -> usize {
        self.live
    }

    /// Live documents in ascending internal ID order.
    pub fn iter(&self) -> impl Iterator<Item = (InternalId, &Document)> {
        self.docs
            .iter()
            .enumerate()
            .filter_map(|(index, doc)| doc.as_ref().map(|doc| (index as InternalId, doc)))
    }

    /// Positional copy of every slot, tombstones included.
    pub fn to_snapshot(&self) -> Vec<Option<Document>> {
        self.docs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Value;

    fn doc(name: &str) -> Document {
        Document::from([("name".to_string(), Value::from(name))])
    }

    #[test]
    fn test_insert_get_remove() {
        let mut store = DocumentsStore::new();
        store.insert(0, doc("John")).unwrap();
        store.insert(1, doc("Jane")).unwrap();
        assert_eq!(store.count(), 2);
        assert_eq!(store.get(1), Some(&doc("Jane")));

        assert_eq!(store.remove(0), Some(doc("John")));
        assert_eq!(store.remove(0), None);
        assert_eq!(store.get(0), None);
        assert_eq!(store.count(), 1);
        // positions do not shift
        assert_eq!(store.get(1), Some(&doc("Jane")));
    }

    #[test]
    fn test_insert_into_live_slot_fails() {
        let mut store = DocumentsStore::new();
        store.insert(0, doc("John")).unwrap();
        assert!(matches!(
            store.insert(0, doc("Jane")),
            Err(SiftError::SlotOccupied { internal_id: 0 })
        ));
    }

    #[test]
    fn test_tombstone_can_be_refilled() {
        let mut store = DocumentsStore::new();
        store.insert(0, doc("John")).unwrap();
        store.remove(0);
        store.insert(0, doc("Johnny")).unwrap();
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_snapshot_keeps_tombstones() {
        let mut store = DocumentsStore::new();
        store.insert(0, doc("a")).unwrap();
        store.insert(2, doc("c")).unwrap();
        store.insert(1, doc("b")).unwrap();
        store.remove(1);

        let snapshot = store.to_snapshot();
        assert_eq!(snapshot, vec![Some(doc("a")), None, Some(doc("c"))]);
        assert_eq!(store.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut store = DocumentsStore::new();
        assert_eq!(store.remove(42), None);
        assert!(!store.is_live(42));
    }
}
