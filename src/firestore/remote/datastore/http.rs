use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value as JsonValue};

use crate::firestore::api::{DocumentSnapshot, SnapshotMetadata};
use crate::firestore::core::QueryDefinition;
use crate::firestore::error::{internal_error, FirestoreError, FirestoreErrorCode, FirestoreResult};
use crate::firestore::model::{DatabaseId, DocumentKey};
use crate::firestore::remote::connection::{Connection, ConnectionBuilder, RequestContext};
use crate::firestore::remote::serializer::JsonProtoSerializer;
use crate::firestore::remote::structured_query::encode_structured_query;
use crate::platform::token::AsyncTokenProvider;

use super::Datastore;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Datastore backed by the Firestore REST API. Requests are not retried.
#[derive(Clone)]
pub struct HttpDatastore {
    connection: Connection,
    serializer: JsonProtoSerializer,
    auth_provider: Option<Arc<dyn AsyncTokenProvider>>,
    request_timeout: Duration,
}

#[derive(Clone)]
pub struct HttpDatastoreBuilder {
    database_id: DatabaseId,
    connection_builder: ConnectionBuilder,
    auth_provider: Option<Arc<dyn AsyncTokenProvider>>,
    request_timeout: Duration,
}

impl HttpDatastore {
    pub fn builder(database_id: DatabaseId) -> HttpDatastoreBuilder {
        HttpDatastoreBuilder::new(database_id)
    }

    pub fn from_database_id(database_id: DatabaseId) -> FirestoreResult<Self> {
        Self::builder(database_id).build()
    }

    async fn build_request_context(&self) -> FirestoreResult<RequestContext> {
        let auth_token = match &self.auth_provider {
            Some(provider) => provider.get_token(false).await.map_err(|err| {
                log::warn!("failed to fetch auth token for Firestore request: {err}");
                FirestoreError::new(FirestoreErrorCode::Unauthenticated, err.to_string())
            })?,
            None => None,
        };
        Ok(RequestContext {
            auth_token,
            request_timeout: Some(self.request_timeout),
        })
    }

    fn decode_document(&self, document: &JsonValue) -> FirestoreResult<DocumentSnapshot> {
        let name = document
            .get("name")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| internal_error("Firestore document missing 'name' field"))?;
        let key = self.serializer.decode_document_key(name)?;
        let fields = self.serializer.decode_document_fields(document)?;
        Ok(DocumentSnapshot::new(
            key,
            Some(fields),
            SnapshotMetadata::new(false, false),
        ))
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Datastore for HttpDatastore {
    async fn get_document(&self, key: &DocumentKey) -> FirestoreResult<DocumentSnapshot> {
        let doc_path = format!("documents/{}", key.path().canonical_string());
        let context = self.build_request_context().await?;
        let response = self
            .connection
            .invoke_json_optional(Method::GET, &doc_path, None, &context)
            .await?;

        match response {
            Some(json) => {
                let fields = self.serializer.decode_document_fields(&json)?;
                Ok(DocumentSnapshot::new(
                    key.clone(),
                    Some(fields),
                    SnapshotMetadata::new(false, false),
                ))
            }
            None => {
                log::debug!("document {key} not found; returning missing snapshot");
                Ok(DocumentSnapshot::new(
                    key.clone(),
                    None,
                    SnapshotMetadata::new(false, false),
                ))
            }
        }
    }

    async fn run_query(&self, query: &QueryDefinition) -> FirestoreResult<Vec<DocumentSnapshot>> {
        let parent = query.parent_path();
        let request_path = if parent.is_empty() {
            "documents:runQuery".to_string()
        } else {
            format!("documents/{}:runQuery", parent.canonical_string())
        };
        let body = json!({
            "structuredQuery": encode_structured_query(&self.serializer, query)?
        });

        let context = self.build_request_context().await?;
        let response = self
            .connection
            .invoke_json(Method::POST, &request_path, Some(body), &context)
            .await?;

        let results = response
            .as_array()
            .ok_or_else(|| internal_error("Firestore runQuery response must be an array"))?;

        log::debug!("runQuery on {request_path} returned {} entries", results.len());
        let mut snapshots = Vec::new();
        for entry in results {
            // Progress-only entries carry no document.
            if let Some(document) = entry.get("document") {
                snapshots.push(self.decode_document(document)?);
            }
        }
        Ok(snapshots)
    }
}

impl HttpDatastoreBuilder {
    fn new(database_id: DatabaseId) -> Self {
        let connection_builder = Connection::builder(database_id.clone());
        Self {
            database_id,
            connection_builder,
            auth_provider: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Attaches a bearer token from `provider` to every request.
    pub fn with_auth_provider(mut self, provider: Arc<dyn AsyncTokenProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connection_builder(mut self, builder: ConnectionBuilder) -> Self {
        self.connection_builder = builder;
        self
    }

    pub fn build(self) -> FirestoreResult<HttpDatastore> {
        let connection = self.connection_builder.build()?;
        Ok(HttpDatastore {
            connection,
            serializer: JsonProtoSerializer::new(self.database_id),
            auth_provider: self.auth_provider,
            request_timeout: self.request_timeout,
        })
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::firestore::core::{FieldFilter, Filter, FilterOperator, LimitType, OrderBy, OrderDirection};
    use crate::firestore::model::{FieldPath, ResourcePath};
    use crate::firestore::value::FirestoreValue;
    use crate::platform::token::TokenError;
    use crate::test_support::try_start_mock_server;
    use httpmock::prelude::*;

    struct StaticToken(&'static str);

    #[async_trait]
    impl AsyncTokenProvider for StaticToken {
        async fn get_token(&self, _force_refresh: bool) -> Result<Option<String>, TokenError> {
            Ok(Some(self.0.to_string()))
        }
    }

    fn datastore_for(server: &MockServer, database_id: &DatabaseId) -> HttpDatastore {
        let connection_builder = Connection::builder(database_id.clone())
            .with_emulator_host(server.address().to_string());
        HttpDatastore::builder(database_id.clone())
            .with_connection_builder(connection_builder)
            .with_auth_provider(Arc::new(StaticToken("owner")))
            .build()
            .expect("datastore")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_query_posts_structured_query() {
        let Some(server) = try_start_mock_server("run_query_posts_structured_query") else {
            return;
        };
        let database_id = DatabaseId::new("demo-project", "(default)");

        let response_body = json!([
            { "readTime": "2024-01-01T00:00:00Z" },
            {
                "document": {
                    "name": "projects/demo-project/databases/(default)/documents/cities/SF",
                    "fields": { "population": { "integerValue": "870000" } }
                }
            },
            {
                "document": {
                    "name": "projects/demo-project/databases/(default)/documents/cities/LA",
                    "fields": { "population": { "integerValue": "3900000" } }
                }
            }
        ]);

        let expected_body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": "cities", "allDescendants": false }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "population" },
                        "op": "GREATER_THAN",
                        "value": { "integerValue": "100" }
                    }
                },
                "orderBy": [
                    { "field": { "fieldPath": "population" }, "direction": "DESCENDING" },
                    { "field": { "fieldPath": "__name__" }, "direction": "DESCENDING" }
                ],
                "limit": 2
            }
        });

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/projects/demo-project/databases/(default)/documents:runQuery")
                .header("authorization", "Bearer owner")
                .json_body(expected_body.clone());
            then.status(200).json_body(response_body.clone());
        });

        let datastore = datastore_for(&server, &database_id);
        let population = FieldPath::from_dot_separated("population").unwrap();
        let definition = QueryDefinition::new(ResourcePath::from_string("cities").unwrap())
            .with_added_filter(Filter::from(FieldFilter::new(
                population.clone(),
                FilterOperator::GreaterThan,
                FirestoreValue::from_integer(100),
            )))
            .unwrap()
            .with_added_order_by(OrderBy::new(population, OrderDirection::Ascending))
            .unwrap()
            .with_limit(Some(2), LimitType::Last);

        let snapshots = datastore.run_query(&definition).await.expect("query");
        mock.assert();
        let names: Vec<_> = snapshots.iter().map(|snap| snap.id().to_string()).collect();
        assert_eq!(names, vec!["SF", "LA"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn get_document_maps_not_found_to_missing() {
        let Some(server) = try_start_mock_server("get_document_maps_not_found_to_missing") else {
            return;
        };
        let database_id = DatabaseId::new("demo-project", "(default)");
        let _mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/projects/demo-project/databases/(default)/documents/cities/nowhere");
            then.status(404)
                .json_body(json!({ "error": { "status": "NOT_FOUND", "message": "missing" } }));
        });

        let datastore = datastore_for(&server, &database_id);
        let key = DocumentKey::from_string("cities/nowhere").unwrap();
        let snapshot = datastore.get_document(&key).await.expect("snapshot");
        assert!(!snapshot.exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_query_surfaces_backend_status() {
        let Some(server) = try_start_mock_server("run_query_surfaces_backend_status") else {
            return;
        };
        let database_id = DatabaseId::new("demo-project", "(default)");
        let _mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/projects/demo-project/databases/(default)/documents:runQuery");
            then.status(400).json_body(json!({
                "error": { "status": "FAILED_PRECONDITION", "message": "The query requires an index." }
            }));
        });

        let datastore = datastore_for(&server, &database_id);
        let definition = QueryDefinition::new_collection_group("landmarks");
        let err = datastore.run_query(&definition).await.unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::FailedPrecondition);
        assert_eq!(err.message(), "The query requires an index.");
    }
}
