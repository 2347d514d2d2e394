pub mod api;
mod constants;
pub mod core;
pub mod error;
pub mod model;
mod query_evaluator;
pub mod remote;
pub mod value;

pub use api::{
    and, end_at, end_before, limit, limit_to_last, or, order_by, query, start_after, start_at,
    where_field, CollectionReference, CursorPosition, DocumentReference, DocumentSnapshot,
    Firestore, FirestoreClient, FirestoreSettings, Query, QueryConstraint, QueryFilterConstraint,
    QuerySnapshot, SnapshotMetadata, UserDataReader, UserValue,
};
pub use self::core::{
    Bound, CompositeFilter, CompositeOperator, FieldFilter, Filter, FilterOperator, LimitType,
    OrderBy, OrderDirection, QueryDefinition,
};
pub use error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
pub use model::{DatabaseId, DocumentKey, FieldPath, GeoPoint, IntoFieldPath, Timestamp};
pub use value::{FirestoreValue, MapValue, ValueKind};
