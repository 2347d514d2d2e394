use std::collections::BTreeMap;

use crate::firestore::model::{DocumentKey, FieldPath, IntoFieldPath};
use crate::firestore::error::FirestoreResult;
use crate::firestore::value::{FirestoreValue, MapValue};

use super::reference::DocumentReference;
use super::Firestore;

/// Metadata about the state of a document snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotMetadata {
    from_cache: bool,
    has_pending_writes: bool,
}

impl SnapshotMetadata {
    pub fn new(from_cache: bool, has_pending_writes: bool) -> Self {
        Self {
            from_cache,
            has_pending_writes,
        }
    }

    /// Indicates whether the snapshot was served from a local cache.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Indicates whether the snapshot contains uncommitted local mutations.
    pub fn has_pending_writes(&self) -> bool {
        self.has_pending_writes
    }
}

/// The contents of one document at the time it was read.
///
/// A snapshot of a document that does not exist has a key but no data.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    key: DocumentKey,
    data: Option<MapValue>,
    metadata: SnapshotMetadata,
}

impl DocumentSnapshot {
    pub fn new(key: DocumentKey, data: Option<MapValue>, metadata: SnapshotMetadata) -> Self {
        Self {
            key,
            data,
            metadata,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the decoded document fields if the snapshot contains data.
    pub fn data(&self) -> Option<&BTreeMap<String, FirestoreValue>> {
        self.data.as_ref().map(|map| map.fields())
    }

    pub fn map_value(&self) -> Option<&MapValue> {
        self.data.as_ref()
    }

    /// Reads one field, e.g. `snapshot.get("address.city")`.
    ///
    /// Returns `Ok(None)` when the document or the field does not exist, and
    /// `Ok(Some(null))` when the field is present and set to null.
    pub fn get<P: IntoFieldPath>(&self, field: P) -> FirestoreResult<Option<&FirestoreValue>> {
        let field = field.into_field_path()?;
        Ok(self.field(&field))
    }

    pub(crate) fn field(&self, field: &FieldPath) -> Option<&FirestoreValue> {
        self.data.as_ref()?.get(field)
    }

    pub fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn document_key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn reference(&self, firestore: Firestore) -> DocumentReference {
        DocumentReference::from_key(firestore, self.key.clone())
    }
}
