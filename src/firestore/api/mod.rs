mod client;
mod constraints;
mod cursor;
mod database;
mod query;
mod reference;
mod snapshot;
mod user_data;

pub use client::FirestoreClient;
pub use constraints::{
    and, end_at, end_before, limit, limit_to_last, or, order_by, query, start_after, start_at,
    where_field, CursorKind, QueryConstraint, QueryFilterConstraint,
};
pub use cursor::CursorPosition;
pub use database::{Firestore, FirestoreSettings};
pub use query::{Query, QuerySnapshot};
pub use reference::{CollectionReference, DocumentReference};
pub use snapshot::{DocumentSnapshot, SnapshotMetadata};
pub use user_data::{ParseContext, UserDataReader, UserDataSource, UserValue};
