use std::sync::Arc;

use crate::firestore::core::LimitType;
use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::DocumentKey;
use crate::firestore::remote::datastore::{Datastore, HttpDatastore, InMemoryDatastore};

use super::database::Firestore;
use super::query::{Query, QuerySnapshot};
use super::snapshot::DocumentSnapshot;

/// Runs reads against a [`Datastore`].
#[derive(Clone)]
pub struct FirestoreClient {
    firestore: Firestore,
    datastore: Arc<dyn Datastore>,
}

impl FirestoreClient {
    /// Creates a client backed by the supplied datastore implementation.
    pub fn new(firestore: Firestore, datastore: Arc<dyn Datastore>) -> Self {
        Self {
            firestore,
            datastore,
        }
    }

    /// Returns a client over an empty in-memory store.
    ///
    /// Useful for tests or demos where network access is not required.
    pub fn with_in_memory(firestore: Firestore) -> Self {
        let datastore = InMemoryDatastore::new(firestore.database_id().clone());
        Self::new(firestore, Arc::new(datastore))
    }

    /// Builds a client that talks to Firestore over the REST endpoints.
    pub fn with_http_datastore(firestore: Firestore) -> FirestoreResult<Self> {
        let datastore = HttpDatastore::from_database_id(firestore.database_id().clone())?;
        Ok(Self::new(firestore, Arc::new(datastore)))
    }

    pub fn firestore(&self) -> &Firestore {
        &self.firestore
    }

    /// Fetches the document located at `path`.
    ///
    /// The snapshot reports `exists() == false` when there is no such document.
    pub async fn get_doc(&self, path: &str) -> FirestoreResult<DocumentSnapshot> {
        let key = DocumentKey::from_string(path)?;
        self.datastore.get_document(&key).await
    }

    /// Executes the provided query and returns its results.
    ///
    /// Limit-to-last queries run with their ordering reversed; the results are
    /// flipped back here so they come out in the requested order.
    pub async fn get_docs(&self, query: &Query) -> FirestoreResult<QuerySnapshot> {
        self.ensure_same_database(query.firestore())?;
        let definition = query.definition();
        definition.validate_has_explicit_order_by_for_limit_to_last()?;
        let mut documents = self.datastore.run_query(definition).await?;
        if definition.limit_type() == LimitType::Last {
            documents.reverse();
        }
        Ok(QuerySnapshot::new(query.clone(), documents))
    }

    fn ensure_same_database(&self, firestore: &Firestore) -> FirestoreResult<()> {
        if self.firestore.database_id() != firestore.database_id() {
            return Err(invalid_argument(
                "Query targets a different Firestore instance than this client",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::api::FirestoreSettings;
    use crate::firestore::core::{FilterOperator, OrderDirection};
    use crate::firestore::value::{FirestoreValue, MapValue};
    use crate::test_support::test_firebase_app;
    use std::collections::BTreeMap;

    fn firestore() -> Firestore {
        Firestore::new(test_firebase_app("project"), FirestoreSettings::default()).unwrap()
    }

    fn seeded() -> (FirestoreClient, Firestore) {
        let firestore = firestore();
        let datastore = InMemoryDatastore::new(firestore.database_id().clone());
        for (id, population) in [("sf", 870), ("la", 3_900), ("sd", 1_400), ("sj", 1_000)] {
            let mut fields = BTreeMap::new();
            fields.insert("population".to_string(), FirestoreValue::from_integer(population));
            datastore.insert(
                DocumentKey::from_string(&format!("cities/{id}")).unwrap(),
                MapValue::new(fields),
            );
        }
        let client = FirestoreClient::new(firestore.clone(), Arc::new(datastore));
        (client, firestore)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn get_doc_reports_missing_documents() {
        let (client, _) = seeded();
        let snapshot = client.get_doc("cities/sf").await.unwrap();
        assert!(snapshot.exists());
        let missing = client.get_doc("cities/nyc").await.unwrap();
        assert!(!missing.exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn limit_to_last_returns_requested_order() {
        let (client, firestore) = seeded();
        let query = firestore
            .collection("cities")
            .unwrap()
            .query()
            .order_by("population", OrderDirection::Ascending)
            .unwrap()
            .limit_to_last(2)
            .unwrap();
        let snapshot = client.get_docs(&query).await.unwrap();
        let ids: Vec<_> = snapshot.documents().iter().map(|doc| doc.id().to_string()).collect();
        assert_eq!(ids, vec!["sd", "la"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn limit_to_last_without_order_is_unimplemented() {
        let (client, firestore) = seeded();
        let query = firestore.collection("cities").unwrap().query().limit_to_last(1).unwrap();
        let err = client.get_docs(&query).await.unwrap_err();
        assert_eq!(err.code_str(), "firestore/unimplemented");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn filters_and_limits() {
        let (client, firestore) = seeded();
        let query = firestore
            .collection("cities")
            .unwrap()
            .query()
            .where_field("population", FilterOperator::GreaterThan, 900)
            .unwrap()
            .limit(2)
            .unwrap();
        let snapshot = client.get_docs(&query).await.unwrap();
        let ids: Vec<_> = snapshot.documents().iter().map(|doc| doc.id().to_string()).collect();
        assert_eq!(ids, vec!["la", "sd"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_queries_from_other_databases() {
        let (client, _) = seeded();
        let other = Firestore::new(test_firebase_app("other"), FirestoreSettings::default()).unwrap();
        let query = other.collection("cities").unwrap().query();
        assert!(client.get_docs(&query).await.is_err());
    }
}
