use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::fmt::{Display, Formatter};

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::{DocumentKey, ResourcePath};

use super::database::Firestore;
use super::query::Query;

#[derive(Clone, Debug)]
pub struct CollectionReference {
    firestore: Firestore,
    path: ResourcePath,
}

impl CollectionReference {
    pub(crate) fn new(firestore: Firestore, path: ResourcePath) -> FirestoreResult<Self> {
        if path.len() % 2 == 0 {
            return Err(invalid_argument(format!(
                "Invalid collection reference. Collection references must have an odd number of segments, but {} has {}.",
                path,
                path.len()
            )));
        }
        Ok(Self { firestore, path })
    }

    /// Returns the Firestore instance that created this collection reference.
    pub fn firestore(&self) -> &Firestore {
        &self.firestore
    }

    /// The full resource path of the collection (e.g. `rooms/eros/messages`).
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.last_segment().unwrap_or_default()
    }

    /// Returns the document that logically contains this collection, if any.
    pub fn parent(&self) -> Option<DocumentReference> {
        let parent_path = self.path.without_last();
        if parent_path.is_empty() {
            return None;
        }
        DocumentReference::new(self.firestore.clone(), parent_path).ok()
    }

    /// Returns a reference to the document identified by `document_id`.
    ///
    /// When `document_id` is `None`, an auto-ID is generated.
    pub fn doc(&self, document_id: Option<&str>) -> FirestoreResult<DocumentReference> {
        let id = document_id
            .map(|id| id.to_string())
            .unwrap_or_else(generate_auto_id);
        let path = self.path.append(&ResourcePath::from_string(&id)?);
        DocumentReference::new(self.firestore.clone(), path)
    }

    /// Creates a query that targets this collection.
    pub fn query(&self) -> Query {
        Query::new(self.firestore.clone(), self.path.clone())
    }
}

impl Display for CollectionReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CollectionReference({})", self.path.canonical_string())
    }
}

#[derive(Clone, Debug)]
pub struct DocumentReference {
    firestore: Firestore,
    key: DocumentKey,
}

impl DocumentReference {
    pub(crate) fn new(firestore: Firestore, path: ResourcePath) -> FirestoreResult<Self> {
        let key = DocumentKey::from_path(path)?;
        Ok(Self { firestore, key })
    }

    pub(crate) fn from_key(firestore: Firestore, key: DocumentKey) -> Self {
        Self { firestore, key }
    }

    /// Returns the Firestore instance that created this document reference.
    pub fn firestore(&self) -> &Firestore {
        &self.firestore
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// The document identifier (the last segment of its path).
    pub fn id(&self) -> &str {
        self.key.id()
    }

    /// The full resource path to the document.
    pub fn path(&self) -> &ResourcePath {
        self.key.path()
    }

    /// The parent collection containing this document.
    pub fn parent(&self) -> CollectionReference {
        CollectionReference {
            firestore: self.firestore.clone(),
            path: self.key.collection_path(),
        }
    }

    /// Returns a reference to a subcollection rooted at this document.
    pub fn collection(&self, path: &str) -> FirestoreResult<CollectionReference> {
        let sub_path = ResourcePath::from_string(path)?;
        let full_path = self.key.path().append(&sub_path);
        CollectionReference::new(self.firestore.clone(), full_path)
    }
}

impl PartialEq for DocumentReference {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.firestore.same_database(&other.firestore)
    }
}

impl Display for DocumentReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DocumentReference({})",
            self.key.path().canonical_string()
        )
    }
}

fn generate_auto_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(20)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::api::FirestoreSettings;
    use crate::test_support::test_firebase_app;

    fn firestore() -> Firestore {
        Firestore::new(test_firebase_app("test-project"), FirestoreSettings::default()).unwrap()
    }

    #[test]
    fn collection_and_document_roundtrip() {
        let firestore = firestore();
        let collection = firestore.collection("cities").unwrap();
        assert_eq!(collection.id(), "cities");
        assert!(collection.parent().is_none());
        let document = collection.doc(Some("sf")).unwrap();
        assert_eq!(document.id(), "sf");
        assert_eq!(document.parent().id(), "cities");

        let nested = document.collection("landmarks").unwrap();
        assert_eq!(nested.path().canonical_string(), "cities/sf/landmarks");
        assert_eq!(nested.parent(), Some(document));
    }

    #[test]
    fn auto_id_generation() {
        let collection = firestore().collection("cities").unwrap();
        let document = collection.doc(None).unwrap();
        assert_eq!(document.parent().id(), "cities");
        assert_eq!(document.id().len(), 20);
    }

    #[test]
    fn rejects_wrong_segment_parity() {
        let firestore = firestore();
        assert!(firestore.collection("cities/sf").is_err());
        assert!(firestore.doc("cities").is_err());
        assert!(firestore
            .collection("cities")
            .unwrap()
            .doc(Some("sf/landmarks"))
            .is_err());
    }
}
