use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::firestore::api::{DocumentSnapshot, SnapshotMetadata};
use crate::firestore::core::QueryDefinition;
use crate::firestore::error::FirestoreResult;
use crate::firestore::model::{DatabaseId, DocumentKey};
use crate::firestore::query_evaluator::apply_query_to_documents;
use crate::firestore::value::MapValue;

use super::Datastore;

/// A datastore that keeps documents in memory and evaluates queries locally.
#[derive(Clone)]
pub struct InMemoryDatastore {
    database_id: DatabaseId,
    documents: Arc<Mutex<BTreeMap<DocumentKey, MapValue>>>,
}

impl InMemoryDatastore {
    pub fn new(database_id: DatabaseId) -> Self {
        Self {
            database_id,
            documents: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    /// Stores `data` at `key`, replacing any previous contents.
    pub fn insert(&self, key: DocumentKey, data: MapValue) {
        self.store().insert(key, data);
    }

    pub fn remove(&self, key: &DocumentKey) -> Option<MapValue> {
        self.store().remove(key)
    }

    pub fn len(&self) -> usize {
        self.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }

    fn store(&self) -> MutexGuard<'_, BTreeMap<DocumentKey, MapValue>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Datastore for InMemoryDatastore {
    async fn get_document(&self, key: &DocumentKey) -> FirestoreResult<DocumentSnapshot> {
        let data = self.store().get(key).cloned();
        Ok(DocumentSnapshot::new(
            key.clone(),
            data,
            SnapshotMetadata::new(true, false),
        ))
    }

    async fn run_query(&self, query: &QueryDefinition) -> FirestoreResult<Vec<DocumentSnapshot>> {
        let documents: Vec<DocumentSnapshot> = self
            .store()
            .iter()
            .map(|(key, data)| {
                DocumentSnapshot::new(
                    key.clone(),
                    Some(data.clone()),
                    SnapshotMetadata::new(true, false),
                )
            })
            .collect();
        Ok(apply_query_to_documents(documents, query, &self.database_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::model::ResourcePath;
    use crate::firestore::value::FirestoreValue;

    #[tokio::test(flavor = "current_thread")]
    async fn stores_and_queries_documents() {
        let datastore = InMemoryDatastore::new(DatabaseId::default("project"));
        assert!(datastore.is_empty());
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), FirestoreValue::from_string("Ada"));
        let key = DocumentKey::from_string("users/ada").unwrap();
        datastore.insert(key.clone(), MapValue::new(fields));
        datastore.insert(
            DocumentKey::from_string("teams/core").unwrap(),
            MapValue::default(),
        );

        let snapshot = datastore.get_document(&key).await.unwrap();
        assert!(snapshot.exists());
        assert_eq!(
            snapshot.get("name").unwrap(),
            Some(&FirestoreValue::from_string("Ada"))
        );

        let query = QueryDefinition::new(ResourcePath::from_string("users").unwrap());
        let results = datastore.run_query(&query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id(), "ada");

        assert!(datastore.remove(&key).is_some());
        assert!(!datastore.get_document(&key).await.unwrap().exists());
        assert_eq!(datastore.len(), 1);
    }
}
