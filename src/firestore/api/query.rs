use crate::firestore::core::{FilterOperator, OrderDirection, QueryDefinition};
use crate::firestore::error::FirestoreResult;
use crate::firestore::model::{IntoFieldPath, ResourcePath};

use super::constraints::{self, QueryConstraint, QueryFilterConstraint};
use super::cursor::CursorPosition;
use super::snapshot::DocumentSnapshot;
use super::user_data::UserValue;
use super::Firestore;

/// A query against a collection or collection group.
///
/// Queries are immutable; every builder method returns a new query and leaves the
/// receiver usable as the base of other queries.
#[derive(Clone, Debug)]
pub struct Query {
    firestore: Firestore,
    definition: QueryDefinition,
}

impl Query {
    pub(crate) fn new(firestore: Firestore, collection_path: ResourcePath) -> Self {
        Self {
            firestore,
            definition: QueryDefinition::new(collection_path),
        }
    }

    pub(crate) fn new_collection_group(firestore: Firestore, collection_id: &str) -> Self {
        Self {
            firestore,
            definition: QueryDefinition::new_collection_group(collection_id),
        }
    }

    pub(crate) fn with_definition(&self, definition: QueryDefinition) -> Self {
        Self {
            firestore: self.firestore.clone(),
            definition,
        }
    }

    /// Returns the Firestore instance that created this query.
    pub fn firestore(&self) -> &Firestore {
        &self.firestore
    }

    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    /// The identifier of the targeted collection or collection group.
    pub fn collection_id(&self) -> &str {
        self.definition.collection_id()
    }

    pub fn apply(&self, constraint: impl Into<QueryConstraint>) -> FirestoreResult<Query> {
        constraints::apply(self, constraint.into())
    }

    pub fn where_field<P, V>(&self, field: P, operator: FilterOperator, value: V) -> FirestoreResult<Query>
    where
        P: IntoFieldPath,
        V: Into<UserValue>,
    {
        self.apply(constraints::where_field(field, operator, value)?)
    }

    /// Adds a filter built with [`constraints::and`] / [`constraints::or`].
    pub fn where_filter(&self, filter: QueryFilterConstraint) -> FirestoreResult<Query> {
        self.apply(filter)
    }

    pub fn order_by<P: IntoFieldPath>(&self, field: P, direction: OrderDirection) -> FirestoreResult<Query> {
        self.apply(constraints::order_by(field, direction)?)
    }

    pub fn limit(&self, limit: i64) -> FirestoreResult<Query> {
        self.apply(constraints::limit(limit)?)
    }

    pub fn limit_to_last(&self, limit: i64) -> FirestoreResult<Query> {
        self.apply(constraints::limit_to_last(limit)?)
    }

    pub fn start_at(&self, position: impl Into<CursorPosition>) -> FirestoreResult<Query> {
        self.apply(constraints::start_at(position))
    }

    pub fn start_after(&self, position: impl Into<CursorPosition>) -> FirestoreResult<Query> {
        self.apply(constraints::start_after(position))
    }

    pub fn end_at(&self, position: impl Into<CursorPosition>) -> FirestoreResult<Query> {
        self.apply(constraints::end_at(position))
    }

    pub fn end_before(&self, position: impl Into<CursorPosition>) -> FirestoreResult<Query> {
        self.apply(constraints::end_before(position))
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.firestore.same_database(&other.firestore) && self.definition == other.definition
    }
}

/// A snapshot containing the results of executing a query.
#[derive(Clone, Debug)]
pub struct QuerySnapshot {
    query: Query,
    documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(query: Query, documents: Vec<DocumentSnapshot>) -> Self {
        Self { query, documents }
    }

    /// Returns the query used to obtain this snapshot.
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn into_documents(self) -> Vec<DocumentSnapshot> {
        self.documents
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}
