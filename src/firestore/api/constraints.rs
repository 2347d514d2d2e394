use crate::firestore::core::{
    CompositeFilter, CompositeOperator, FieldFilter, Filter, FilterOperator, LimitType, OrderBy,
    OrderDirection,
};
use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::{FieldPath, IntoFieldPath};
use crate::firestore::value::FirestoreValue;

use super::cursor::{bound_from_document, bound_from_fields, parse_document_id_value, CursorPosition};
use super::query::Query;
use super::user_data::UserValue;

/// A filter built by [`where_field`], [`and`] or [`or`].
#[derive(Clone, Debug, PartialEq)]
pub enum QueryFilterConstraint {
    Field {
        field: FieldPath,
        operator: FilterOperator,
        value: UserValue,
    },
    Composite {
        operator: CompositeOperator,
        filters: Vec<QueryFilterConstraint>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorKind {
    StartAt,
    StartAfter,
    EndAt,
    EndBefore,
}

impl CursorKind {
    fn method_name(&self) -> &'static str {
        match self {
            CursorKind::StartAt => "startAt",
            CursorKind::StartAfter => "startAfter",
            CursorKind::EndAt => "endAt",
            CursorKind::EndBefore => "endBefore",
        }
    }

    fn inclusive(&self) -> bool {
        matches!(self, CursorKind::StartAt | CursorKind::EndAt)
    }

    fn is_start(&self) -> bool {
        matches!(self, CursorKind::StartAt | CursorKind::StartAfter)
    }
}

/// One step applied to a query by [`query`] or [`Query::apply`].
#[derive(Clone, Debug, PartialEq)]
pub enum QueryConstraint {
    Filter(QueryFilterConstraint),
    OrderBy(OrderBy),
    Limit { limit: u32, limit_type: LimitType },
    Cursor { kind: CursorKind, position: CursorPosition },
}

impl From<QueryFilterConstraint> for QueryConstraint {
    fn from(value: QueryFilterConstraint) -> Self {
        QueryConstraint::Filter(value)
    }
}

/// `where(field, op, value)`.
pub fn where_field<P, V>(
    field: P,
    operator: FilterOperator,
    value: V,
) -> FirestoreResult<QueryFilterConstraint>
where
    P: IntoFieldPath,
    V: Into<UserValue>,
{
    Ok(QueryFilterConstraint::Field {
        field: field.into_field_path()?,
        operator,
        value: value.into(),
    })
}

/// Conjunction of filters. Nest it to combine with `or`.
pub fn and(filters: Vec<QueryFilterConstraint>) -> QueryFilterConstraint {
    QueryFilterConstraint::Composite {
        operator: CompositeOperator::And,
        filters,
    }
}

pub fn or(filters: Vec<QueryFilterConstraint>) -> QueryFilterConstraint {
    QueryFilterConstraint::Composite {
        operator: CompositeOperator::Or,
        filters,
    }
}

pub fn order_by<P: IntoFieldPath>(
    field: P,
    direction: OrderDirection,
) -> FirestoreResult<QueryConstraint> {
    Ok(QueryConstraint::OrderBy(OrderBy::new(
        field.into_field_path()?,
        direction,
    )))
}

pub fn limit(limit: i64) -> FirestoreResult<QueryConstraint> {
    Ok(QueryConstraint::Limit {
        limit: validate_positive("limit", limit)?,
        limit_type: LimitType::First,
    })
}

/// Keeps the last `limit` results. Needs at least one explicit ordering by the
/// time the query runs.
pub fn limit_to_last(limit: i64) -> FirestoreResult<QueryConstraint> {
    Ok(QueryConstraint::Limit {
        limit: validate_positive("limitToLast", limit)?,
        limit_type: LimitType::Last,
    })
}

pub fn start_at(position: impl Into<CursorPosition>) -> QueryConstraint {
    cursor(CursorKind::StartAt, position)
}

pub fn start_after(position: impl Into<CursorPosition>) -> QueryConstraint {
    cursor(CursorKind::StartAfter, position)
}

pub fn end_at(position: impl Into<CursorPosition>) -> QueryConstraint {
    cursor(CursorKind::EndAt, position)
}

pub fn end_before(position: impl Into<CursorPosition>) -> QueryConstraint {
    cursor(CursorKind::EndBefore, position)
}

fn cursor(kind: CursorKind, position: impl Into<CursorPosition>) -> QueryConstraint {
    QueryConstraint::Cursor {
        kind,
        position: position.into(),
    }
}

fn validate_positive(method_name: &str, value: i64) -> FirestoreResult<u32> {
    if value <= 0 {
        return Err(invalid_argument(format!(
            "Function {method_name}() requires a positive number, but it was: {value}."
        )));
    }
    u32::try_from(value).map_err(|_| {
        invalid_argument(format!(
            "Function {method_name}() requires a number no larger than {}, but it was: {value}.",
            u32::MAX
        ))
    })
}

/// Applies `constraints` to `base` in order.
///
/// A composite filter may not sit next to other filters at the top level; nest
/// them instead, as in `and(vec![where_field(..)?, or(..)])`.
pub fn query<I>(base: &Query, constraints: I) -> FirestoreResult<Query>
where
    I: IntoIterator<Item = QueryConstraint>,
{
    let constraints: Vec<QueryConstraint> = constraints.into_iter().collect();
    validate_constraint_list(&constraints)?;
    constraints
        .into_iter()
        .try_fold(base.clone(), |query, constraint| apply(&query, constraint))
}

fn validate_constraint_list(constraints: &[QueryConstraint]) -> FirestoreResult<()> {
    let composite_count = constraints
        .iter()
        .filter(|constraint| {
            matches!(
                constraint,
                QueryConstraint::Filter(QueryFilterConstraint::Composite { .. })
            )
        })
        .count();
    let field_count = constraints
        .iter()
        .filter(|constraint| {
            matches!(
                constraint,
                QueryConstraint::Filter(QueryFilterConstraint::Field { .. })
            )
        })
        .count();

    if composite_count > 1 || (composite_count > 0 && field_count > 0) {
        return Err(invalid_argument(
            "InvalidQuery. When using composite filters, you cannot use more than one filter at the top level. Consider nesting the multiple filters within an `and(...)` statement. For example: change `query(query, where(...), or(...))` to `query(query, and(where(...), or(...)))`.",
        ));
    }
    Ok(())
}

pub(crate) fn apply(query: &Query, constraint: QueryConstraint) -> FirestoreResult<Query> {
    let definition = query.definition();
    let next = match constraint {
        QueryConstraint::Filter(filter) => {
            let parsed = parse_filter(query, &filter)?;
            definition.with_added_filter(parsed)?
        }
        QueryConstraint::OrderBy(order_by) => definition.with_added_order_by(order_by)?,
        QueryConstraint::Limit { limit, limit_type } => {
            definition.with_limit(Some(limit), limit_type)
        }
        QueryConstraint::Cursor { kind, position } => {
            let database_id = query.firestore().database_id();
            let method_name = kind.method_name();
            let bound = match &position {
                CursorPosition::Document(document) => bound_from_document(
                    definition,
                    database_id,
                    method_name,
                    document,
                    kind.inclusive(),
                )?,
                CursorPosition::Fields(values) => bound_from_fields(
                    definition,
                    database_id,
                    &query.firestore().user_data_reader(),
                    method_name,
                    values,
                    kind.inclusive(),
                )?,
            };
            if kind.is_start() {
                definition.with_start_at(bound)
            } else {
                definition.with_end_at(bound)
            }
        }
    };
    Ok(query.with_definition(next))
}

fn parse_filter(query: &Query, filter: &QueryFilterConstraint) -> FirestoreResult<Filter> {
    match filter {
        QueryFilterConstraint::Field {
            field,
            operator,
            value,
        } => new_query_filter(query, field, *operator, value).map(Filter::Field),
        QueryFilterConstraint::Composite { operator, filters } => {
            let mut parsed = Vec::with_capacity(filters.len());
            for child in filters {
                let child = parse_filter(query, child)?;
                if !child.is_empty() {
                    parsed.push(child);
                }
            }
            if parsed.len() == 1 {
                return Ok(parsed.remove(0));
            }
            Ok(Filter::Composite(CompositeFilter::new(*operator, parsed)))
        }
    }
}

fn new_query_filter(
    query: &Query,
    field: &FieldPath,
    operator: FilterOperator,
    value: &UserValue,
) -> FirestoreResult<FieldFilter> {
    let definition = query.definition();
    let database_id = query.firestore().database_id();

    let parsed = if field.is_document_id() {
        match operator {
            FilterOperator::ArrayContains | FilterOperator::ArrayContainsAny => {
                return Err(invalid_argument(format!(
                    "Invalid Query. You can't perform '{operator}' queries on documentId()."
                )));
            }
            FilterOperator::In | FilterOperator::NotIn => {
                let elements = disjunctive_elements(value, operator)?;
                let references = elements
                    .iter()
                    .map(|element| parse_document_id_value(definition, database_id, element))
                    .collect::<FirestoreResult<Vec<_>>>()?;
                FirestoreValue::from_array(references)
            }
            _ => parse_document_id_value(definition, database_id, value)?,
        }
    } else {
        if operator.is_disjunctive() {
            disjunctive_elements(value, operator)?;
        }
        let allow_arrays = matches!(operator, FilterOperator::In | FilterOperator::NotIn);
        query
            .firestore()
            .user_data_reader()
            .parse_query_value("where", value, allow_arrays)?
    };

    Ok(FieldFilter::new(field.clone(), operator, parsed))
}

fn disjunctive_elements(value: &UserValue, operator: FilterOperator) -> FirestoreResult<&[UserValue]> {
    match value {
        UserValue::Array(elements) if !elements.is_empty() => Ok(elements.as_slice()),
        _ => Err(invalid_argument(format!(
            "Invalid Query. A non-empty array is required for '{operator}' filters."
        ))),
    }
}
