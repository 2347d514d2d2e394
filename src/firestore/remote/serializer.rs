use std::collections::{btree_map, BTreeMap};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::firestore::constants::{
    LOCAL_WRITE_TIME_KEY, PREVIOUS_VALUE_KEY, SERVER_TIMESTAMP_TYPE, TYPE_KEY, VECTOR_TYPE,
    VECTOR_VALUE_KEY,
};
use crate::firestore::error::{internal_error, invalid_argument, FirestoreResult};
use crate::firestore::model::{DatabaseId, DocumentKey, GeoPoint, ResourcePath, Timestamp};
use crate::firestore::value::{BytesValue, FirestoreValue, MapValue, ValueKind};

/// Converts values and documents to and from the proto3 JSON used by the REST API.
#[derive(Clone, Debug)]
pub struct JsonProtoSerializer {
    database_id: DatabaseId,
}

impl JsonProtoSerializer {
    pub fn new(database_id: DatabaseId) -> Self {
        Self { database_id }
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub fn database_name(&self) -> String {
        database_name(&self.database_id)
    }

    pub fn document_name(&self, key: &DocumentKey) -> String {
        resource_name(&self.database_id, key.path())
    }

    /// Resource name of a collection's parent, as used by `runQuery`.
    pub fn parent_name(&self, parent: &ResourcePath) -> String {
        resource_name(&self.database_id, parent)
    }

    /// Encodes a single value. Fails with `InvalidArgument` when a timestamp lies
    /// outside the range the backend stores.
    pub fn encode_value(&self, value: &FirestoreValue) -> FirestoreResult<JsonValue> {
        encode_value(value)
    }

    /// Decodes a single wire value. A value object without a recognised key
    /// decodes to `None` rather than null; inside an array it is an error.
    pub fn decode_value(&self, value: &JsonValue) -> FirestoreResult<Option<FirestoreValue>> {
        decode_value(value)
    }

    pub fn encode_map_fields(&self, map: &MapValue) -> FirestoreResult<JsonValue> {
        encode_map_fields(map)
    }

    /// Reads the `fields` of a wire document. Documents without fields decode
    /// to an empty map.
    pub fn decode_document_fields(&self, document: &JsonValue) -> FirestoreResult<MapValue> {
        decode_map_value(document)
    }

    /// Parses a fully qualified document name into a key of this database.
    pub fn decode_document_key(&self, name: &str) -> FirestoreResult<DocumentKey> {
        let (database_id, key) = decode_resource_name(name)?;
        if database_id != self.database_id {
            return Err(internal_error(format!(
                "Document {name} does not belong to database {}",
                self.database_id
            )));
        }
        Ok(key)
    }
}

fn database_name(database_id: &DatabaseId) -> String {
    format!(
        "projects/{}/databases/{}",
        database_id.project_id(),
        database_id.database()
    )
}

fn resource_name(database_id: &DatabaseId, path: &ResourcePath) -> String {
    if path.is_empty() {
        format!("{}/documents", database_name(database_id))
    } else {
        format!(
            "{}/documents/{}",
            database_name(database_id),
            path.canonical_string()
        )
    }
}

fn decode_resource_name(name: &str) -> FirestoreResult<(DatabaseId, DocumentKey)> {
    let segments: Vec<&str> = name.split('/').collect();
    let valid = segments.len() >= 6
        && segments[0] == "projects"
        && segments[2] == "databases"
        && segments[4] == "documents";
    if !valid {
        return Err(internal_error(format!("Tried to deserialize invalid key {name}")));
    }
    let database_id = DatabaseId::new(segments[1], segments[3]);
    let path = ResourcePath::from_segments(segments[5..].iter().copied());
    let key = DocumentKey::from_path(path)
        .map_err(|err| internal_error(format!("Invalid document name {name}: {}", err.message())))?;
    Ok((database_id, key))
}

fn encode_map_fields(map: &MapValue) -> FirestoreResult<JsonValue> {
    let mut fields = JsonMap::new();
    for (key, value) in map.fields() {
        fields.insert(key.clone(), encode_value(value)?);
    }
    Ok(JsonValue::Object(fields))
}

fn encode_double(value: f64) -> JsonValue {
    if value.is_nan() {
        json!("NaN")
    } else if value == f64::INFINITY {
        json!("Infinity")
    } else if value == f64::NEG_INFINITY {
        json!("-Infinity")
    } else {
        json!(value)
    }
}

/// A container whose children are still being encoded.
enum EncodeFrame<'a> {
    Array {
        children: std::slice::Iter<'a, FirestoreValue>,
        values: Vec<JsonValue>,
    },
    Map {
        children: btree_map::Iter<'a, String, FirestoreValue>,
        key: Option<&'a String>,
        fields: JsonMap<String, JsonValue>,
    },
    ServerTimestamp {
        previous: Option<&'a FirestoreValue>,
        fields: JsonMap<String, JsonValue>,
    },
}

impl<'a> EncodeFrame<'a> {
    fn next_child(&mut self) -> Option<&'a FirestoreValue> {
        match self {
            EncodeFrame::Array { children, .. } => children.next(),
            EncodeFrame::Map { children, key, .. } => children.next().map(|(name, value)| {
                *key = Some(name);
                value
            }),
            EncodeFrame::ServerTimestamp { previous, .. } => previous.take(),
        }
    }

    fn accept(&mut self, encoded: JsonValue) {
        match self {
            EncodeFrame::Array { values, .. } => values.push(encoded),
            EncodeFrame::Map { key, fields, .. } => {
                if let Some(name) = key.take() {
                    fields.insert(name.clone(), encoded);
                }
            }
            EncodeFrame::ServerTimestamp { fields, .. } => {
                fields.insert(PREVIOUS_VALUE_KEY.to_string(), encoded);
            }
        }
    }

    fn finish(self) -> JsonValue {
        match self {
            EncodeFrame::Array { values, .. } => json!({ "arrayValue": { "values": values } }),
            EncodeFrame::Map { fields, .. } | EncodeFrame::ServerTimestamp { fields, .. } => {
                json!({ "mapValue": { "fields": JsonValue::Object(fields) } })
            }
        }
    }
}

enum Encoded<'a> {
    Done(JsonValue),
    Open(EncodeFrame<'a>),
}

/// Encodes `root` with an explicit stack so nesting depth is bounded only by memory.
fn encode_value(root: &FirestoreValue) -> FirestoreResult<JsonValue> {
    let mut stack: Vec<EncodeFrame<'_>> = Vec::new();
    let mut pending = Some(root);
    let mut encoded: Option<JsonValue> = None;
    loop {
        if let Some(value) = pending.take() {
            match encode_shallow(value)? {
                Encoded::Done(json) => encoded = Some(json),
                Encoded::Open(frame) => stack.push(frame),
            }
        }
        let Some(frame) = stack.last_mut() else {
            return encoded.ok_or_else(|| internal_error("Value encoding produced no output"));
        };
        if let Some(json) = encoded.take() {
            frame.accept(json);
        }
        match frame.next_child() {
            Some(child) => pending = Some(child),
            None => {
                if let Some(frame) = stack.pop() {
                    encoded = Some(frame.finish());
                }
            }
        }
    }
}

fn encode_shallow(value: &FirestoreValue) -> FirestoreResult<Encoded<'_>> {
    let json = match value.kind() {
        ValueKind::Null => json!({ "nullValue": JsonValue::Null }),
        ValueKind::Boolean(boolean) => json!({ "booleanValue": boolean }),
        ValueKind::Integer(integer) => json!({ "integerValue": integer.to_string() }),
        ValueKind::Double(double) => json!({ "doubleValue": encode_double(*double) }),
        ValueKind::Timestamp(timestamp) => {
            json!({ "timestampValue": encode_timestamp(timestamp)? })
        }
        ValueKind::String(string) => json!({ "stringValue": string }),
        ValueKind::Bytes(bytes) => json!({ "bytesValue": bytes.to_base64() }),
        ValueKind::Reference(reference) => json!({
            "referenceValue": resource_name(reference.database_id(), reference.key().path())
        }),
        ValueKind::GeoPoint(point) => json!({
            "geoPointValue": {
                "latitude": point.latitude(),
                "longitude": point.longitude(),
            }
        }),
        ValueKind::Array(array) => {
            return Ok(Encoded::Open(EncodeFrame::Array {
                children: array.values().iter(),
                values: Vec::with_capacity(array.len()),
            }))
        }
        ValueKind::Map(map) => {
            return Ok(Encoded::Open(EncodeFrame::Map {
                children: map.fields().iter(),
                key: None,
                fields: JsonMap::new(),
            }))
        }
        ValueKind::Vector(vector) => {
            let values = vector
                .values()
                .iter()
                .map(|value| json!({ "doubleValue": encode_double(*value) }))
                .collect::<Vec<_>>();
            json!({
                "mapValue": {
                    "fields": {
                        TYPE_KEY: { "stringValue": VECTOR_TYPE },
                        VECTOR_VALUE_KEY: { "arrayValue": { "values": values } },
                    }
                }
            })
        }
        ValueKind::ServerTimestamp(placeholder) => {
            let mut fields = JsonMap::new();
            fields.insert(
                TYPE_KEY.to_string(),
                json!({ "stringValue": SERVER_TIMESTAMP_TYPE }),
            );
            fields.insert(
                LOCAL_WRITE_TIME_KEY.to_string(),
                json!({ "timestampValue": encode_timestamp(&placeholder.local_write_time())? }),
            );
            return Ok(Encoded::Open(EncodeFrame::ServerTimestamp {
                previous: placeholder.previous_value(),
                fields,
            }));
        }
    };
    Ok(Encoded::Done(json))
}

/// The `fields` object of a wire map or document, if present.
fn map_fields(value: &JsonValue) -> FirestoreResult<Option<&JsonMap<String, JsonValue>>> {
    let map = value
        .as_object()
        .ok_or_else(|| internal_error("Expected object for map value"))?;
    match map.get("fields") {
        Some(fields_value) => fields_value
            .as_object()
            .map(Some)
            .ok_or_else(|| internal_error("Expected 'fields' to be an object")),
        None => Ok(None),
    }
}

fn decode_map_value(value: &JsonValue) -> FirestoreResult<MapValue> {
    let Some(fields_object) = map_fields(value)? else {
        return Ok(MapValue::new(BTreeMap::new()));
    };
    let mut fields = BTreeMap::new();
    for (key, value) in fields_object {
        if let Some(decoded) = decode_value(value)? {
            fields.insert(key.clone(), decoded);
        }
    }
    Ok(MapValue::new(fields))
}

fn decode_double(value: &JsonValue) -> FirestoreResult<f64> {
    match value {
        JsonValue::Number(number) => number
            .as_f64()
            .ok_or_else(|| internal_error("Invalid doubleValue")),
        JsonValue::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .parse::<f64>()
                .map_err(|err| internal_error(format!("Invalid doubleValue: {err}"))),
        },
        _ => Err(internal_error("doubleValue must be a number or string")),
    }
}

/// A wire container whose children are still being decoded.
enum DecodeFrame<'a> {
    Array {
        children: std::slice::Iter<'a, JsonValue>,
        values: Vec<FirestoreValue>,
    },
    Map {
        children: serde_json::map::Iter<'a>,
        key: Option<&'a String>,
        fields: BTreeMap<String, FirestoreValue>,
    },
}

impl<'a> DecodeFrame<'a> {
    fn next_child(&mut self) -> Option<&'a JsonValue> {
        match self {
            DecodeFrame::Array { children, .. } => children.next(),
            DecodeFrame::Map { children, key, .. } => children.next().map(|(name, value)| {
                *key = Some(name);
                value
            }),
        }
    }

    /// Unrecognised map entries are left out; unrecognised array elements are an
    /// error so later elements keep their positions.
    fn accept(&mut self, decoded: Option<FirestoreValue>) -> FirestoreResult<()> {
        match self {
            DecodeFrame::Array { values, .. } => {
                let value = decoded.ok_or_else(|| {
                    internal_error(format!(
                        "arrayValue.values[{}] has no recognised value type",
                        values.len()
                    ))
                })?;
                values.push(value);
            }
            DecodeFrame::Map { key, fields, .. } => {
                if let (Some(name), Some(value)) = (key.take(), decoded) {
                    fields.insert(name.clone(), value);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> FirestoreResult<FirestoreValue> {
        match self {
            DecodeFrame::Array { values, .. } => Ok(FirestoreValue::from_array(values)),
            DecodeFrame::Map { fields, .. } => decode_special_map(MapValue::new(fields)),
        }
    }
}

enum Decoded<'a> {
    Done(Option<FirestoreValue>),
    Open(DecodeFrame<'a>),
}

/// Decodes `root` with an explicit stack so nesting depth is bounded only by memory.
fn decode_value(root: &JsonValue) -> FirestoreResult<Option<FirestoreValue>> {
    let mut stack: Vec<DecodeFrame<'_>> = Vec::new();
    let mut pending = Some(root);
    let mut decoded: Option<Option<FirestoreValue>> = None;
    loop {
        if let Some(value) = pending.take() {
            match decode_shallow(value)? {
                Decoded::Done(value) => decoded = Some(value),
                Decoded::Open(frame) => stack.push(frame),
            }
        }
        let Some(frame) = stack.last_mut() else {
            return Ok(decoded.flatten());
        };
        if let Some(value) = decoded.take() {
            frame.accept(value)?;
        }
        match frame.next_child() {
            Some(child) => pending = Some(child),
            None => {
                if let Some(frame) = stack.pop() {
                    decoded = Some(Some(frame.finish()?));
                }
            }
        }
    }
}

fn decode_shallow(value: &JsonValue) -> FirestoreResult<Decoded<'_>> {
    let object = value
        .as_object()
        .ok_or_else(|| internal_error("Expected Firestore value object"))?;
    if object.contains_key("nullValue") {
        return Ok(Decoded::Done(Some(FirestoreValue::null())));
    }
    if let Some(bool_value) = object.get("booleanValue") {
        let value = bool_value
            .as_bool()
            .ok_or_else(|| internal_error("booleanValue must be bool"))?;
        return Ok(Decoded::Done(Some(FirestoreValue::from_bool(value))));
    }
    if let Some(integer_value) = object.get("integerValue") {
        let parsed = match integer_value {
            JsonValue::String(value) => value
                .parse::<i64>()
                .map_err(|err| internal_error(format!("Invalid integerValue: {err}")))?,
            JsonValue::Number(number) => number
                .as_i64()
                .ok_or_else(|| internal_error("Integer out of range"))?,
            _ => return Err(internal_error("integerValue must be a string or number")),
        };
        return Ok(Decoded::Done(Some(FirestoreValue::from_integer(parsed))));
    }
    if let Some(double_value) = object.get("doubleValue") {
        return Ok(Decoded::Done(Some(FirestoreValue::from_double(decode_double(double_value)?))));
    }
    if let Some(timestamp_value) = object.get("timestampValue") {
        return Ok(Decoded::Done(Some(FirestoreValue::from_timestamp(decode_timestamp(
            timestamp_value,
        )?))));
    }
    if let Some(string_value) = object.get("stringValue") {
        let str_value = string_value
            .as_str()
            .ok_or_else(|| internal_error("stringValue must be string"))?;
        return Ok(Decoded::Done(Some(FirestoreValue::from_string(str_value))));
    }
    if let Some(bytes_value) = object.get("bytesValue") {
        let str_value = bytes_value
            .as_str()
            .ok_or_else(|| internal_error("bytesValue must be base64 string"))?;
        let decoded = BytesValue::from_base64(str_value)
            .map_err(|err| internal_error(format!("Invalid bytesValue: {err}")))?;
        return Ok(Decoded::Done(Some(FirestoreValue::from_bytes(decoded))));
    }
    if let Some(reference_value) = object.get("referenceValue") {
        let name = reference_value
            .as_str()
            .ok_or_else(|| internal_error("referenceValue must be string"))?;
        let (database_id, key) = decode_resource_name(name)?;
        return Ok(Decoded::Done(Some(FirestoreValue::from_reference(database_id, key))));
    }
    if let Some(geo_point) = object.get("geoPointValue") {
        // Proto3 JSON omits zero coordinates.
        let coordinate = |name: &str| -> FirestoreResult<f64> {
            match geo_point.get(name) {
                None => Ok(0.0),
                Some(value) => value
                    .as_f64()
                    .ok_or_else(|| internal_error(format!("geoPointValue.{name} must be a number"))),
            }
        };
        let point = GeoPoint::new(coordinate("latitude")?, coordinate("longitude")?)
            .map_err(|err| internal_error(err.message()))?;
        return Ok(Decoded::Done(Some(FirestoreValue::from_geo_point(point))));
    }
    if let Some(array_value) = object.get("arrayValue") {
        let Some(values) = array_value.get("values") else {
            return Ok(Decoded::Done(Some(FirestoreValue::from_array(Vec::new()))));
        };
        let entries = values
            .as_array()
            .ok_or_else(|| internal_error("arrayValue.values must be an array"))?;
        return Ok(Decoded::Open(DecodeFrame::Array {
            children: entries.iter(),
            values: Vec::with_capacity(entries.len()),
        }));
    }
    if let Some(map_value) = object.get("mapValue") {
        return Ok(match map_fields(map_value)? {
            Some(fields) => Decoded::Open(DecodeFrame::Map {
                children: fields.iter(),
                key: None,
                fields: BTreeMap::new(),
            }),
            None => Decoded::Done(Some(FirestoreValue::from_map(BTreeMap::new()))),
        });
    }

    Ok(Decoded::Done(None))
}

/// Recognises vectors and server timestamp placeholders encoded as maps.
fn decode_special_map(map: MapValue) -> FirestoreResult<FirestoreValue> {
    let type_tag = map.fields().get(TYPE_KEY).and_then(FirestoreValue::as_str);
    match type_tag {
        Some(VECTOR_TYPE) => {
            let values = match map.fields().get(VECTOR_VALUE_KEY) {
                None => Vec::new(),
                Some(value) => {
                    let array = value
                        .as_array()
                        .ok_or_else(|| internal_error("Vector value must be an array"))?;
                    array
                        .values()
                        .iter()
                        .map(|element| match element.kind() {
                            ValueKind::Double(double) => Ok(*double),
                            ValueKind::Integer(integer) => Ok(*integer as f64),
                            _ => Err(internal_error("Vector elements must be numbers")),
                        })
                        .collect::<FirestoreResult<Vec<_>>>()?
                }
            };
            Ok(FirestoreValue::from_vector(values))
        }
        Some(SERVER_TIMESTAMP_TYPE) => {
            let local_write_time = match map.fields().get(LOCAL_WRITE_TIME_KEY).map(FirestoreValue::kind) {
                Some(ValueKind::Timestamp(timestamp)) => *timestamp,
                _ => {
                    return Err(internal_error(
                        "Server timestamp placeholder is missing its local write time",
                    ))
                }
            };
            let previous = map.fields().get(PREVIOUS_VALUE_KEY).cloned();
            Ok(FirestoreValue::server_timestamp(local_write_time, previous))
        }
        _ => Ok(FirestoreValue::from_map(map.into_fields())),
    }
}

fn encode_timestamp(timestamp: &Timestamp) -> FirestoreResult<String> {
    timestamp.validate()?;
    DateTime::<Utc>::from_timestamp(timestamp.seconds, timestamp.nanos as u32)
        .map(|datetime| datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .ok_or_else(|| {
            invalid_argument(format!(
                "Timestamp seconds out of range: {}",
                timestamp.seconds
            ))
        })
}

fn decode_timestamp(value: &JsonValue) -> FirestoreResult<Timestamp> {
    let text = value
        .as_str()
        .ok_or_else(|| internal_error("timestampValue must be string"))?;
    let datetime = DateTime::parse_from_rfc3339(text)
        .map_err(|err| internal_error(format!("Invalid timestamp: {err}")))?;
    let datetime_utc = datetime.with_timezone(&Utc);
    Timestamp::try_new(
        datetime_utc.timestamp(),
        datetime_utc.timestamp_subsec_nanos() as i32,
    )
    .map_err(|err| internal_error(err.message()))
}
