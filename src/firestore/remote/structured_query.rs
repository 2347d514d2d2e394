use serde_json::{json, Value as JsonValue};

use crate::firestore::core::{
    Bound, CompositeFilter, CompositeOperator, FieldFilter, Filter, FilterOperator,
    QueryDefinition,
};
use crate::firestore::error::FirestoreResult;
use crate::firestore::remote::serializer::JsonProtoSerializer;

/// Encodes the transport-facing form of `definition` as a `StructuredQuery`.
///
/// Limit-to-last queries are emitted with flipped ordering and swapped cursors;
/// callers reverse the returned documents. Fails when a filter or cursor value
/// cannot be represented on the wire.
pub fn encode_structured_query(
    serializer: &JsonProtoSerializer,
    definition: &QueryDefinition,
) -> FirestoreResult<JsonValue> {
    let mut structured = serde_json::Map::new();

    structured.insert(
        "from".to_string(),
        json!([{
            "collectionId": definition.collection_id(),
            "allDescendants": definition.is_collection_group(),
        }]),
    );

    if let Some(filter_json) = encode_filters(serializer, definition.filters())? {
        structured.insert("where".to_string(), filter_json);
    }

    let orders: Vec<_> = definition
        .request_order_by()
        .iter()
        .map(|order| {
            json!({
                "field": { "fieldPath": order.field().canonical_string() },
                "direction": order.direction().as_str(),
            })
        })
        .collect();
    structured.insert("orderBy".to_string(), JsonValue::Array(orders));

    if let Some(limit) = definition.limit() {
        structured.insert("limit".to_string(), json!(limit));
    }

    if let Some(start) = definition.request_start_at() {
        structured.insert(
            "startAt".to_string(),
            encode_cursor(serializer, start, true)?,
        );
    }

    if let Some(end) = definition.request_end_at() {
        structured.insert("endAt".to_string(), encode_cursor(serializer, end, false)?);
    }

    Ok(JsonValue::Object(structured))
}

fn encode_filters(
    serializer: &JsonProtoSerializer,
    filters: &[Filter],
) -> FirestoreResult<Option<JsonValue>> {
    let mut encoded = Vec::with_capacity(filters.len());
    for filter in filters {
        if let Some(filter_json) = encode_filter(serializer, filter)? {
            encoded.push(filter_json);
        }
    }
    Ok(match encoded.len() {
        0 => None,
        1 => encoded.pop(),
        _ => Some(json!({
            "compositeFilter": {
                "op": CompositeOperator::And.as_str(),
                "filters": encoded
            }
        })),
    })
}

fn encode_filter(
    serializer: &JsonProtoSerializer,
    filter: &Filter,
) -> FirestoreResult<Option<JsonValue>> {
    match filter {
        Filter::Field(field) => encode_field_filter(serializer, field).map(Some),
        Filter::Composite(composite) => encode_composite_filter(serializer, composite),
    }
}

fn encode_composite_filter(
    serializer: &JsonProtoSerializer,
    composite: &CompositeFilter,
) -> FirestoreResult<Option<JsonValue>> {
    let mut nested = Vec::with_capacity(composite.filters().len());
    for filter in composite.filters() {
        if let Some(filter_json) = encode_filter(serializer, filter)? {
            nested.push(filter_json);
        }
    }
    Ok(match nested.len() {
        0 => None,
        1 => nested.pop(),
        _ => Some(json!({
            "compositeFilter": {
                "op": composite.operator().as_str(),
                "filters": nested
            }
        })),
    })
}

fn unary_operator(filter: &FieldFilter) -> Option<&'static str> {
    let value = filter.value();
    match filter.operator() {
        FilterOperator::Equal if value.is_null() => Some("IS_NULL"),
        FilterOperator::Equal if value.is_nan() => Some("IS_NAN"),
        FilterOperator::NotEqual if value.is_null() => Some("IS_NOT_NULL"),
        FilterOperator::NotEqual if value.is_nan() => Some("IS_NOT_NAN"),
        _ => None,
    }
}

fn encode_field_filter(
    serializer: &JsonProtoSerializer,
    filter: &FieldFilter,
) -> FirestoreResult<JsonValue> {
    let field = json!({ "fieldPath": filter.field().canonical_string() });
    if let Some(op) = unary_operator(filter) {
        return Ok(json!({
            "unaryFilter": {
                "field": field,
                "op": op,
            }
        }));
    }
    Ok(json!({
        "fieldFilter": {
            "field": field,
            "op": filter.operator().as_str(),
            "value": serializer.encode_value(filter.value())?
        }
    }))
}

fn encode_cursor(
    serializer: &JsonProtoSerializer,
    bound: &Bound,
    start: bool,
) -> FirestoreResult<JsonValue> {
    let values = bound
        .values()
        .iter()
        .map(|value| serializer.encode_value(value))
        .collect::<FirestoreResult<Vec<_>>>()?;
    Ok(json!({
        "values": values,
        "before": if start { bound.inclusive() } else { !bound.inclusive() },
    }))
}
