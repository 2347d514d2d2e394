use std::borrow::Cow;
use std::cmp::Ordering;

use crate::firestore::api::DocumentSnapshot;
use crate::firestore::core::{
    Bound, CompositeFilter, FieldFilter, Filter, FilterOperator, OrderBy, OrderDirection,
    QueryDefinition,
};
use crate::firestore::model::{DatabaseId, FieldPath};
use crate::firestore::value::{compare_values, type_order, FirestoreValue, ValueKind};

/// Runs the transport-facing form of `definition` over `documents`.
///
/// Like the backend, this evaluates [`QueryDefinition::request_order_by`] and the
/// request cursors and keeps the first `limit` matches. Limit-to-last results
/// therefore come back in reverse and are flipped by the caller.
pub(crate) fn apply_query_to_documents(
    documents: Vec<DocumentSnapshot>,
    definition: &QueryDefinition,
    database_id: &DatabaseId,
) -> Vec<DocumentSnapshot> {
    let order_by = definition.request_order_by();
    let mut matched: Vec<DocumentSnapshot> = documents
        .into_iter()
        .filter(|snapshot| snapshot.exists())
        .filter(|snapshot| definition.matches_path(snapshot.document_key()))
        .filter(|snapshot| has_order_by_fields(snapshot, &order_by))
        .filter(|snapshot| {
            definition
                .filters()
                .iter()
                .all(|filter| filter_matches(filter, snapshot, database_id))
        })
        .collect();

    matched.sort_by(|left, right| compare_snapshots(left, right, &order_by, database_id));

    if let Some(bound) = definition.request_start_at() {
        matched.retain(|snapshot| {
            let ordering = compare_bound_to_document(bound, snapshot, &order_by, database_id);
            if bound.inclusive() {
                ordering != Ordering::Greater
            } else {
                ordering == Ordering::Less
            }
        });
    }

    if let Some(bound) = definition.request_end_at() {
        matched.retain(|snapshot| {
            let ordering = compare_bound_to_document(bound, snapshot, &order_by, database_id);
            if bound.inclusive() {
                ordering != Ordering::Less
            } else {
                ordering == Ordering::Greater
            }
        });
    }

    if let Some(limit) = definition.limit() {
        matched.truncate(limit as usize);
    }

    matched
}

fn field_value<'a>(
    snapshot: &'a DocumentSnapshot,
    field: &FieldPath,
    database_id: &DatabaseId,
) -> Option<Cow<'a, FirestoreValue>> {
    if field.is_document_id() {
        return Some(Cow::Owned(FirestoreValue::from_reference(
            database_id.clone(),
            snapshot.document_key().clone(),
        )));
    }
    snapshot.field(field).map(Cow::Borrowed)
}

fn has_order_by_fields(snapshot: &DocumentSnapshot, order_by: &[OrderBy]) -> bool {
    order_by
        .iter()
        .all(|order| order.field().is_document_id() || snapshot.field(order.field()).is_some())
}

fn filter_matches(filter: &Filter, snapshot: &DocumentSnapshot, database_id: &DatabaseId) -> bool {
    match filter {
        Filter::Field(field) => field_filter_matches(field, snapshot, database_id),
        Filter::Composite(composite) => composite_filter_matches(composite, snapshot, database_id),
    }
}

fn composite_filter_matches(
    composite: &CompositeFilter,
    snapshot: &DocumentSnapshot,
    database_id: &DatabaseId,
) -> bool {
    let mut children = composite.filters().iter();
    if composite.is_conjunction() {
        children.all(|child| filter_matches(child, snapshot, database_id))
    } else {
        children.any(|child| filter_matches(child, snapshot, database_id))
    }
}

fn field_filter_matches(
    filter: &FieldFilter,
    snapshot: &DocumentSnapshot,
    database_id: &DatabaseId,
) -> bool {
    let operand = filter.value();
    let value = field_value(snapshot, filter.field(), database_id);

    match filter.operator() {
        FilterOperator::ArrayContains => match value.as_deref().map(FirestoreValue::kind) {
            Some(ValueKind::Array(array)) => array.contains(operand),
            _ => false,
        },
        FilterOperator::ArrayContainsAny => {
            match (value.as_deref().map(FirestoreValue::kind), operand.as_array()) {
                (Some(ValueKind::Array(array)), Some(needles)) => {
                    needles.values().iter().any(|needle| array.contains(needle))
                }
                _ => false,
            }
        }
        FilterOperator::In => match (value, operand.as_array()) {
            (Some(value), Some(candidates)) => candidates.contains(&value),
            _ => false,
        },
        FilterOperator::NotIn => {
            let Some(candidates) = operand.as_array() else {
                return false;
            };
            if candidates.values().iter().any(FirestoreValue::is_null) {
                return false;
            }
            match value {
                Some(value) => !value.is_null() && !candidates.contains(&value),
                None => false,
            }
        }
        FilterOperator::NotEqual => match value {
            Some(value) if !value.is_null() => compare_values(&value, operand) != Ordering::Equal,
            _ => false,
        },
        comparison => match value {
            Some(value) if type_order(&value) == type_order(operand) => {
                matches_comparison(comparison, compare_values(&value, operand))
            }
            _ => false,
        },
    }
}

fn matches_comparison(operator: FilterOperator, ordering: Ordering) -> bool {
    match operator {
        FilterOperator::LessThan => ordering == Ordering::Less,
        FilterOperator::LessThanOrEqual => ordering != Ordering::Greater,
        FilterOperator::Equal => ordering == Ordering::Equal,
        FilterOperator::GreaterThanOrEqual => ordering != Ordering::Less,
        FilterOperator::GreaterThan => ordering == Ordering::Greater,
        _ => false,
    }
}

fn directed(ordering: Ordering, direction: OrderDirection) -> Ordering {
    match direction {
        OrderDirection::Ascending => ordering,
        OrderDirection::Descending => ordering.reverse(),
    }
}

fn compare_snapshots(
    left: &DocumentSnapshot,
    right: &DocumentSnapshot,
    order_by: &[OrderBy],
    database_id: &DatabaseId,
) -> Ordering {
    for order in order_by {
        let ordering = match (
            field_value(left, order.field(), database_id),
            field_value(right, order.field(), database_id),
        ) {
            (Some(left_value), Some(right_value)) => compare_values(&left_value, &right_value),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        let ordering = directed(ordering, order.direction());
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Compares the cursor position with a document, component by component.
fn compare_bound_to_document(
    bound: &Bound,
    snapshot: &DocumentSnapshot,
    order_by: &[OrderBy],
    database_id: &DatabaseId,
) -> Ordering {
    for (position, order) in bound.values().iter().zip(order_by) {
        let ordering = match field_value(snapshot, order.field(), database_id) {
            Some(value) => compare_values(position, &value),
            None => Ordering::Greater,
        };
        let ordering = directed(ordering, order.direction());
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
