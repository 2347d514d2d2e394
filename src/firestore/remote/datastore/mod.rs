use async_trait::async_trait;

use crate::firestore::api::DocumentSnapshot;
use crate::firestore::core::QueryDefinition;
use crate::firestore::error::FirestoreResult;
use crate::firestore::model::DocumentKey;

pub mod http;
pub mod in_memory;

/// Executes reads on behalf of a [`FirestoreClient`](crate::firestore::api::FirestoreClient).
///
/// `run_query` receives the query as built. Implementations execute its
/// transport-facing form (`request_order_by`, `request_start_at`,
/// `request_end_at`) and return the first `limit` matches in that order.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Datastore: Send + Sync + 'static {
    async fn get_document(&self, key: &DocumentKey) -> FirestoreResult<DocumentSnapshot>;
    async fn run_query(&self, query: &QueryDefinition) -> FirestoreResult<Vec<DocumentSnapshot>>;
}

pub use http::{HttpDatastore, HttpDatastoreBuilder};
pub use in_memory::InMemoryDatastore;
