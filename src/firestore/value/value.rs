use std::collections::BTreeMap;

use crate::firestore::model::{DatabaseId, DocumentKey, GeoPoint, Timestamp};
use crate::firestore::value::{ArrayValue, BytesValue, MapValue, VectorValue};

/// A typed Firestore value.
///
/// Equality is structural. Doubles compare by bit pattern, except that every NaN
/// equals every other NaN, so `-0.0` and `0.0` are distinct values.
#[derive(Clone, Debug, PartialEq)]
pub struct FirestoreValue {
    kind: ValueKind,
}

#[derive(Clone, Debug)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(Timestamp),
    String(String),
    Bytes(BytesValue),
    Reference(ReferenceValue),
    GeoPoint(GeoPoint),
    Array(ArrayValue),
    Map(MapValue),
    Vector(VectorValue),
    ServerTimestamp(ServerTimestampValue),
}

/// A document reference scoped to the database it lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceValue {
    database_id: DatabaseId,
    key: DocumentKey,
}

impl ReferenceValue {
    pub fn new(database_id: DatabaseId, key: DocumentKey) -> Self {
        Self { database_id, key }
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }
}

/// A server generated timestamp that has not been committed yet.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerTimestampValue {
    local_write_time: Timestamp,
    previous_value: Option<Box<FirestoreValue>>,
}

impl ServerTimestampValue {
    pub fn new(local_write_time: Timestamp, previous_value: Option<FirestoreValue>) -> Self {
        Self {
            local_write_time,
            previous_value: previous_value.map(Box::new),
        }
    }

    pub fn local_write_time(&self) -> Timestamp {
        self.local_write_time
    }

    pub fn previous_value(&self) -> Option<&FirestoreValue> {
        self.previous_value.as_deref()
    }
}

impl PartialEq for ValueKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Boolean(a), ValueKind::Boolean(b)) => a == b,
            (ValueKind::Integer(a), ValueKind::Integer(b)) => a == b,
            (ValueKind::Double(a), ValueKind::Double(b)) => doubles_equal(*a, *b),
            (ValueKind::Timestamp(a), ValueKind::Timestamp(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Bytes(a), ValueKind::Bytes(b)) => a == b,
            (ValueKind::Reference(a), ValueKind::Reference(b)) => a == b,
            (ValueKind::GeoPoint(a), ValueKind::GeoPoint(b)) => a == b,
            (ValueKind::Array(a), ValueKind::Array(b)) => a == b,
            (ValueKind::Map(a), ValueKind::Map(b)) => a == b,
            (ValueKind::Vector(a), ValueKind::Vector(b)) => a == b,
            (ValueKind::ServerTimestamp(a), ValueKind::ServerTimestamp(b)) => a == b,
            _ => false,
        }
    }
}

pub(crate) fn doubles_equal(left: f64, right: f64) -> bool {
    if left.is_nan() && right.is_nan() {
        return true;
    }
    left.to_bits() == right.to_bits()
}

impl FirestoreValue {
    pub fn null() -> Self {
        Self {
            kind: ValueKind::Null,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Self {
            kind: ValueKind::Boolean(value),
        }
    }

    pub fn from_integer(value: i64) -> Self {
        Self {
            kind: ValueKind::Integer(value),
        }
    }

    pub fn from_double(value: f64) -> Self {
        Self {
            kind: ValueKind::Double(value),
        }
    }

    pub fn from_timestamp(value: Timestamp) -> Self {
        Self {
            kind: ValueKind::Timestamp(value),
        }
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::String(value.into()),
        }
    }

    pub fn from_bytes(value: impl Into<BytesValue>) -> Self {
        Self {
            kind: ValueKind::Bytes(value.into()),
        }
    }

    pub fn from_reference(database_id: DatabaseId, key: DocumentKey) -> Self {
        Self {
            kind: ValueKind::Reference(ReferenceValue::new(database_id, key)),
        }
    }

    pub fn from_geo_point(value: GeoPoint) -> Self {
        Self {
            kind: ValueKind::GeoPoint(value),
        }
    }

    pub fn from_array(values: Vec<FirestoreValue>) -> Self {
        Self {
            kind: ValueKind::Array(ArrayValue::new(values)),
        }
    }

    pub fn from_map(map: BTreeMap<String, FirestoreValue>) -> Self {
        Self {
            kind: ValueKind::Map(MapValue::new(map)),
        }
    }

    pub fn from_vector(values: Vec<f64>) -> Self {
        Self {
            kind: ValueKind::Vector(VectorValue::new(values)),
        }
    }

    /// Placeholder for a server timestamp written locally but not yet acknowledged.
    pub fn server_timestamp(
        local_write_time: Timestamp,
        previous_value: Option<FirestoreValue>,
    ) -> Self {
        Self {
            kind: ValueKind::ServerTimestamp(ServerTimestampValue::new(
                local_write_time,
                previous_value,
            )),
        }
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn into_kind(self) -> ValueKind {
        self.kind
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.kind, ValueKind::Double(value) if value.is_nan())
    }

    pub fn is_server_timestamp(&self) -> bool {
        matches!(self.kind, ValueKind::ServerTimestamp(_))
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match &self.kind {
            ValueKind::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match &self.kind {
            ValueKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<ValueKind> for FirestoreValue {
    fn from(kind: ValueKind) -> Self {
        Self { kind }
    }
}
