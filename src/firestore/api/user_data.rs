use std::collections::{btree_map, BTreeMap};

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::firestore::error::{invalid_argument, FirestoreError, FirestoreResult};
use crate::firestore::model::{DatabaseId, GeoPoint, Timestamp};
use crate::firestore::value::{BytesValue, FirestoreValue, VectorValue};

use super::reference::DocumentReference;

/// An application value before it has been checked and converted to a
/// [`FirestoreValue`].
///
/// `Undefined` is the absent marker: depending on
/// [`FirestoreSettings::ignore_undefined_properties`](super::FirestoreSettings) it is
/// either dropped from the enclosing map or rejected.
#[derive(Clone, Debug, PartialEq)]
pub enum UserValue {
    Undefined,
    Null,
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Double(f64),
    String(String),
    Bytes(BytesValue),
    Timestamp(Timestamp),
    GeoPoint(GeoPoint),
    Reference(DocumentReference),
    Vector(VectorValue),
    Array(Vec<UserValue>),
    Map(BTreeMap<String, UserValue>),
}

impl UserValue {
    /// Converts any serde serializable value.
    ///
    /// Values serde cannot express as JSON (for example maps with non string keys)
    /// are rejected with `InvalidArgument`.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> FirestoreResult<Self> {
        let json = serde_json::to_value(value)
            .map_err(|err| invalid_argument(format!("Unsupported field value: {err}")))?;
        Ok(Self::from_json(json))
    }

    fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => UserValue::Null,
            JsonValue::Bool(value) => UserValue::Boolean(value),
            JsonValue::Number(number) => {
                if let Some(value) = number.as_i64() {
                    UserValue::Integer(value)
                } else if let Some(value) = number.as_u64() {
                    UserValue::Unsigned(value)
                } else {
                    UserValue::Double(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(value) => UserValue::String(value),
            JsonValue::Array(values) => {
                UserValue::Array(values.into_iter().map(Self::from_json).collect())
            }
            JsonValue::Object(map) => UserValue::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Short description used in error messages.
    pub(crate) fn description(&self) -> &'static str {
        match self {
            UserValue::Undefined => "undefined",
            UserValue::Null => "null",
            UserValue::Boolean(_) => "a boolean",
            UserValue::Integer(_) | UserValue::Unsigned(_) | UserValue::Double(_) => "a number",
            UserValue::String(_) => "a string",
            UserValue::Bytes(_) => "a Bytes object",
            UserValue::Timestamp(_) => "a Timestamp",
            UserValue::GeoPoint(_) => "a GeoPoint",
            UserValue::Reference(_) => "a DocumentReference",
            UserValue::Vector(_) => "a VectorValue",
            UserValue::Array(_) => "an array",
            UserValue::Map(_) => "an object",
        }
    }
}

macro_rules! user_value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for UserValue {
                fn from(value: $source) -> Self {
                    UserValue::$variant(value.into())
                }
            }
        )*
    };
}

user_value_from! {
    bool => Boolean,
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    i64 => Integer,
    u8 => Integer,
    u16 => Integer,
    u32 => Integer,
    u64 => Unsigned,
    f32 => Double,
    f64 => Double,
    String => String,
    &str => String,
    BytesValue => Bytes,
    Timestamp => Timestamp,
    GeoPoint => GeoPoint,
    DocumentReference => Reference,
    VectorValue => Vector,
    Vec<UserValue> => Array,
    BTreeMap<String, UserValue> => Map,
}

impl From<&DocumentReference> for UserValue {
    fn from(value: &DocumentReference) -> Self {
        UserValue::Reference(value.clone())
    }
}

impl<T: Into<UserValue>> From<Option<T>> for UserValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(UserValue::Null)
    }
}

/// Where the value being read comes from, which decides whether nested arrays
/// are allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserDataSource {
    /// A single query argument, such as a filter value or cursor component.
    Argument,
    /// The operand of `in` / `not-in`, whose elements may themselves be arrays.
    ArrayArgument,
}

/// Position inside the value being read.
#[derive(Clone, Debug)]
pub struct ParseContext<'a> {
    method_name: &'a str,
    data_source: UserDataSource,
    /// `None` once inside an array, where field paths are not tracked.
    path: Option<Vec<String>>,
    array_element: bool,
}

impl<'a> ParseContext<'a> {
    pub fn new(method_name: &'a str, data_source: UserDataSource) -> Self {
        Self {
            method_name,
            data_source,
            path: Some(Vec::new()),
            array_element: false,
        }
    }

    fn child_for_field(&self, field: &str) -> FirestoreResult<Self> {
        let path = self.path.as_ref().map(|path| {
            let mut path = path.clone();
            path.push(field.to_string());
            path
        });
        let context = Self {
            path,
            array_element: false,
            ..self.clone()
        };
        if field.is_empty() {
            return Err(context.create_error("Document fields must not be empty"));
        }
        Ok(context)
    }

    fn child_for_array(&self) -> Self {
        Self {
            path: None,
            array_element: true,
            ..self.clone()
        }
    }

    pub fn create_error(&self, reason: impl AsRef<str>) -> FirestoreError {
        let mut message = format!(
            "Function {}() called with invalid data. {}",
            self.method_name,
            reason.as_ref()
        );
        if let Some(path) = self.path.as_ref().filter(|path| !path.is_empty()) {
            message.push_str(&format!(" (found in field {})", path.join(".")));
        }
        invalid_argument(message)
    }
}

/// Converts [`UserValue`]s into typed values for one database.
#[derive(Clone, Debug)]
pub struct UserDataReader {
    database_id: DatabaseId,
    ignore_undefined_properties: bool,
}

impl UserDataReader {
    pub fn new(database_id: DatabaseId, ignore_undefined_properties: bool) -> Self {
        Self {
            database_id,
            ignore_undefined_properties,
        }
    }

    /// Reads a filter operand or cursor component.
    ///
    /// `allow_arrays` is set for `in` / `not-in` operands whose elements may be arrays.
    pub fn parse_query_value(
        &self,
        method_name: &str,
        value: &UserValue,
        allow_arrays: bool,
    ) -> FirestoreResult<FirestoreValue> {
        let source = if allow_arrays {
            UserDataSource::ArrayArgument
        } else {
            UserDataSource::Argument
        };
        let context = ParseContext::new(method_name, source);
        self.parse_data(value, &context)?
            .ok_or_else(|| context.create_error("Unsupported field value: undefined"))
    }

    /// Reads `value` at the position described by `context`.
    ///
    /// `Ok(None)` means the value should be left out of its enclosing map. Nested
    /// maps and arrays are walked with an explicit stack.
    pub fn parse_data(
        &self,
        value: &UserValue,
        context: &ParseContext<'_>,
    ) -> FirestoreResult<Option<FirestoreValue>> {
        let mut stack: Vec<ParseFrame<'_, '_>> = Vec::new();
        let mut pending = Some((value, context.clone()));
        let mut parsed: Option<Option<FirestoreValue>> = None;
        loop {
            if let Some((value, context)) = pending.take() {
                match self.parse_shallow(value, context)? {
                    Parsed::Done(value) => parsed = Some(value),
                    Parsed::Open(frame) => stack.push(frame),
                }
            }
            let Some(frame) = stack.last_mut() else {
                return Ok(parsed.flatten());
            };
            if let Some(value) = parsed.take() {
                frame.accept(value);
            }
            match frame.next_child()? {
                Some(child) => pending = Some(child),
                None => {
                    if let Some(frame) = stack.pop() {
                        parsed = Some(Some(frame.finish()));
                    }
                }
            }
        }
    }

    fn parse_shallow<'v, 'c>(
        &self,
        value: &'v UserValue,
        context: ParseContext<'c>,
    ) -> FirestoreResult<Parsed<'v, 'c>> {
        let parsed = match value {
            UserValue::Undefined if self.ignore_undefined_properties => {
                return Ok(Parsed::Done(None))
            }
            UserValue::Undefined => {
                return Err(context.create_error("Unsupported field value: undefined"))
            }
            UserValue::Map(fields) => {
                return Ok(Parsed::Open(ParseFrame::Map {
                    children: fields.iter(),
                    key: None,
                    fields: BTreeMap::new(),
                    context,
                }))
            }
            UserValue::Array(values) => {
                if context.array_element && context.data_source != UserDataSource::ArrayArgument
                {
                    return Err(context.create_error("Nested arrays are not supported"));
                }
                return Ok(Parsed::Open(ParseFrame::Array {
                    children: values.iter(),
                    values: Vec::with_capacity(values.len()),
                    context: context.child_for_array(),
                }));
            }
            UserValue::Null => FirestoreValue::null(),
            UserValue::Boolean(value) => FirestoreValue::from_bool(*value),
            UserValue::Integer(value) => FirestoreValue::from_integer(*value),
            UserValue::Unsigned(value) => match i64::try_from(*value) {
                Ok(value) => FirestoreValue::from_integer(value),
                Err(_) => FirestoreValue::from_double(*value as f64),
            },
            UserValue::Double(value) => FirestoreValue::from_double(*value),
            UserValue::String(value) => FirestoreValue::from_string(value.clone()),
            UserValue::Bytes(value) => FirestoreValue::from_bytes(value.clone()),
            UserValue::Timestamp(value) => {
                value
                    .validate()
                    .map_err(|err| context.create_error(err.message()))?;
                FirestoreValue::from_timestamp(value.truncated_to_micros())
            }
            UserValue::GeoPoint(value) => FirestoreValue::from_geo_point(*value),
            UserValue::Vector(value) => FirestoreValue::from_vector(value.values().to_vec()),
            UserValue::Reference(reference) => {
                let other = reference.firestore().database_id();
                if other != &self.database_id {
                    return Err(context.create_error(format!(
                        "Document reference is for database {} but should be for database {}",
                        other, self.database_id
                    )));
                }
                FirestoreValue::from_reference(self.database_id.clone(), reference.key().clone())
            }
        };
        Ok(Parsed::Done(Some(parsed)))
    }
}

/// A map or array whose children are still being read.
enum ParseFrame<'v, 'c> {
    Map {
        children: btree_map::Iter<'v, String, UserValue>,
        key: Option<&'v String>,
        fields: BTreeMap<String, FirestoreValue>,
        context: ParseContext<'c>,
    },
    /// `context` is the one shared by every element.
    Array {
        children: std::slice::Iter<'v, UserValue>,
        values: Vec<FirestoreValue>,
        context: ParseContext<'c>,
    },
}

impl<'v, 'c> ParseFrame<'v, 'c> {
    fn next_child(&mut self) -> FirestoreResult<Option<(&'v UserValue, ParseContext<'c>)>> {
        match self {
            ParseFrame::Map {
                children,
                key,
                context,
                ..
            } => match children.next() {
                Some((name, value)) => {
                    let child_context = context.child_for_field(name)?;
                    *key = Some(name);
                    Ok(Some((value, child_context)))
                }
                None => Ok(None),
            },
            ParseFrame::Array {
                children, context, ..
            } => Ok(children.next().map(|value| (value, context.clone()))),
        }
    }

    /// Maps drop skipped values; arrays store them as null.
    fn accept(&mut self, parsed: Option<FirestoreValue>) {
        match self {
            ParseFrame::Map { key, fields, .. } => {
                if let (Some(name), Some(value)) = (key.take(), parsed) {
                    fields.insert(name.clone(), value);
                }
            }
            ParseFrame::Array { values, .. } => {
                values.push(parsed.unwrap_or_else(FirestoreValue::null));
            }
        }
    }

    fn finish(self) -> FirestoreValue {
        match self {
            ParseFrame::Map { fields, .. } => FirestoreValue::from_map(fields),
            ParseFrame::Array { values, .. } => FirestoreValue::from_array(values),
        }
    }
}

enum Parsed<'v, 'c> {
    Done(Option<FirestoreValue>),
    Open(ParseFrame<'v, 'c>),
}
