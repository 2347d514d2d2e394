use crate::firestore::core::{Bound, QueryDefinition};
use crate::firestore::error::{invalid_argument, not_found, FirestoreResult};
use crate::firestore::model::{DatabaseId, DocumentKey, ResourcePath};
use crate::firestore::value::FirestoreValue;

use super::snapshot::DocumentSnapshot;
use super::user_data::{UserDataReader, UserValue};

/// Where a cursor starts or ends: at a document, or at explicit field values.
#[derive(Clone, Debug, PartialEq)]
pub enum CursorPosition {
    Document(DocumentSnapshot),
    Fields(Vec<UserValue>),
}

impl From<DocumentSnapshot> for CursorPosition {
    fn from(value: DocumentSnapshot) -> Self {
        CursorPosition::Document(value)
    }
}

impl From<&DocumentSnapshot> for CursorPosition {
    fn from(value: &DocumentSnapshot) -> Self {
        CursorPosition::Document(value.clone())
    }
}

impl From<Vec<UserValue>> for CursorPosition {
    fn from(value: Vec<UserValue>) -> Self {
        CursorPosition::Fields(value)
    }
}

/// Builds a bound positioned exactly at `document`.
///
/// Walks the normalized ordering so the position always ends with the document
/// key and therefore matches a single document.
pub(crate) fn bound_from_document(
    definition: &QueryDefinition,
    database_id: &DatabaseId,
    method_name: &str,
    document: &DocumentSnapshot,
    inclusive: bool,
) -> FirestoreResult<Bound> {
    if !document.exists() {
        return Err(not_found(format!(
            "Can't use a DocumentSnapshot that doesn't exist for {method_name}()."
        )));
    }

    let mut components = Vec::new();
    for order_by in definition.normalized_order_by() {
        let field = order_by.field();
        if field.is_document_id() {
            components.push(FirestoreValue::from_reference(
                database_id.clone(),
                document.document_key().clone(),
            ));
            continue;
        }
        match document.field(field) {
            Some(value) if value.is_server_timestamp() => {
                return Err(invalid_argument(format!(
                    "Invalid query. You are trying to start or end a query using a document for which the field \"{field}\" is an uncommitted server timestamp. (Since the value of this field is unknown, you cannot start/end a query with it.)"
                )));
            }
            Some(value) => components.push(value.clone()),
            None => {
                return Err(invalid_argument(format!(
                    "Invalid query. You are trying to start or end a query using a document for which the field '{field}' (used as the orderBy) does not exist."
                )));
            }
        }
    }
    Ok(Bound::new(components, inclusive))
}

/// Builds a bound from explicit values, one per explicit ordering entry.
pub(crate) fn bound_from_fields(
    definition: &QueryDefinition,
    database_id: &DatabaseId,
    reader: &UserDataReader,
    method_name: &str,
    values: &[UserValue],
    inclusive: bool,
) -> FirestoreResult<Bound> {
    let order_by = definition.explicit_order_by();
    if values.len() > order_by.len() {
        return Err(invalid_argument(format!(
            "Too many arguments provided to {method_name}(). The number of arguments must be less than or equal to the number of orderBy() clauses ({} provided, {} orderBy() clauses)",
            values.len(),
            order_by.len()
        )));
    }

    let mut components = Vec::with_capacity(values.len());
    for (raw, order) in values.iter().zip(order_by) {
        if !order.field().is_document_id() {
            components.push(reader.parse_query_value(method_name, raw, false)?);
            continue;
        }

        let UserValue::String(id) = raw else {
            return Err(invalid_argument(format!(
                "Invalid query. Expected a string for document ID in {method_name}(), but got {}",
                raw.description()
            )));
        };
        if !definition.is_collection_group() && id.contains('/') {
            return Err(invalid_argument(format!(
                "Invalid query. When querying a collection and ordering by documentId(), the value passed to {method_name}() must be a plain document ID, but '{id}' contains a slash."
            )));
        }
        let path = definition.path().append(&ResourcePath::from_string(id)?);
        if !DocumentKey::is_document_key(&path) {
            return Err(invalid_argument(format!(
                "Invalid query. When querying a collection group and ordering by documentId(), the value passed to {method_name}() must result in a valid document path, but '{path}' is not because it contains an odd number of segments."
            )));
        }
        let key = DocumentKey::from_path(path)?;
        components.push(FirestoreValue::from_reference(database_id.clone(), key));
    }

    Ok(Bound::new(components, inclusive))
}

/// Converts a `documentId()` filter operand into a reference value.
pub(crate) fn parse_document_id_value(
    definition: &QueryDefinition,
    database_id: &DatabaseId,
    value: &UserValue,
) -> FirestoreResult<FirestoreValue> {
    match value {
        UserValue::String(id) => {
            if id.is_empty() {
                return Err(invalid_argument(
                    "Invalid query. When querying with documentId(), you must provide a valid document ID, but it was an empty string.",
                ));
            }
            if !definition.is_collection_group() && id.contains('/') {
                return Err(invalid_argument(format!(
                    "Invalid query. When querying a collection by documentId(), you must provide a plain document ID, but '{id}' contains a '/' character."
                )));
            }
            let path = definition.path().append(&ResourcePath::from_string(id)?);
            if !DocumentKey::is_document_key(&path) {
                return Err(invalid_argument(format!(
                    "Invalid query. When querying a collection group by documentId(), the value provided must result in a valid document path, but '{path}' is not because it has an odd number of segments ({}).",
                    path.len()
                )));
            }
            let key = DocumentKey::from_path(path)?;
            Ok(FirestoreValue::from_reference(database_id.clone(), key))
        }
        UserValue::Reference(reference) => Ok(FirestoreValue::from_reference(
            database_id.clone(),
            reference.key().clone(),
        )),
        other => Err(invalid_argument(format!(
            "Invalid query. When querying with documentId(), you must provide a valid string or a DocumentReference, but it was: {}.",
            other.description()
        ))),
    }
}
