use std::fmt::{Display, Formatter};

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::FieldPath;
use crate::firestore::value::FirestoreValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    GreaterThanOrEqual,
    GreaterThan,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl FilterOperator {
    /// Every operator, in declaration order.
    pub const ALL: [FilterOperator; 10] = [
        FilterOperator::LessThan,
        FilterOperator::LessThanOrEqual,
        FilterOperator::Equal,
        FilterOperator::NotEqual,
        FilterOperator::GreaterThanOrEqual,
        FilterOperator::GreaterThan,
        FilterOperator::ArrayContains,
        FilterOperator::ArrayContainsAny,
        FilterOperator::In,
        FilterOperator::NotIn,
    ];

    /// Wire name used by the structured query protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::LessThan => "LESS_THAN",
            FilterOperator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            FilterOperator::Equal => "EQUAL",
            FilterOperator::NotEqual => "NOT_EQUAL",
            FilterOperator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            FilterOperator::GreaterThan => "GREATER_THAN",
            FilterOperator::ArrayContains => "ARRAY_CONTAINS",
            FilterOperator::ArrayContainsAny => "ARRAY_CONTAINS_ANY",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT_IN",
        }
    }

    /// The operator string accepted by `where`, e.g. `"<="` or `"array-contains"`.
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::Equal => "==",
            FilterOperator::NotEqual => "!=",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::ArrayContains => "array-contains",
            FilterOperator::ArrayContainsAny => "array-contains-any",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not-in",
        }
    }

    pub fn from_symbol(symbol: &str) -> FirestoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.symbol() == symbol)
            .ok_or_else(|| {
                invalid_argument(format!(
                    "Invalid query. '{symbol}' is not a valid filter operator."
                ))
            })
    }

    pub fn is_inequality(&self) -> bool {
        matches!(
            self,
            FilterOperator::LessThan
                | FilterOperator::LessThanOrEqual
                | FilterOperator::GreaterThan
                | FilterOperator::GreaterThanOrEqual
                | FilterOperator::NotEqual
                | FilterOperator::NotIn
        )
    }

    /// Operators that take an array of candidates as their value.
    pub fn is_disjunctive(&self) -> bool {
        matches!(
            self,
            FilterOperator::In | FilterOperator::NotIn | FilterOperator::ArrayContainsAny
        )
    }

    fn forbidden_companions(&self) -> &'static [FilterOperator] {
        match self {
            FilterOperator::NotEqual => &[FilterOperator::NotEqual, FilterOperator::NotIn],
            FilterOperator::ArrayContainsAny | FilterOperator::In => &[FilterOperator::NotIn],
            FilterOperator::NotIn => &[
                FilterOperator::ArrayContainsAny,
                FilterOperator::In,
                FilterOperator::NotIn,
                FilterOperator::NotEqual,
            ],
            _ => &[],
        }
    }

    /// Whether the two operators may not appear together in one query.
    ///
    /// The relation is symmetric: a pair conflicts if either side forbids the other.
    pub fn conflicts_with(&self, other: FilterOperator) -> bool {
        self.forbidden_companions().contains(&other)
            || other.forbidden_companions().contains(self)
    }
}

impl Display for FilterOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeOperator {
    And,
    Or,
}

impl CompositeOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeOperator::And => "AND",
            CompositeOperator::Or => "OR",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    field: FieldPath,
    operator: FilterOperator,
    value: FirestoreValue,
}

impl FieldFilter {
    pub fn new(field: FieldPath, operator: FilterOperator, value: FirestoreValue) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }

    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &FirestoreValue {
        &self.value
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompositeFilter {
    operator: CompositeOperator,
    filters: Vec<Filter>,
}

impl CompositeFilter {
    pub fn new(operator: CompositeOperator, filters: Vec<Filter>) -> Self {
        Self { operator, filters }
    }

    pub fn operator(&self) -> CompositeOperator {
        self.operator
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_conjunction(&self) -> bool {
        self.operator == CompositeOperator::And
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Field(FieldFilter),
    Composite(CompositeFilter),
}

impl Filter {
    /// Collects every field filter reachable from this node, depth first.
    pub fn flattened_filters(&self) -> Vec<&FieldFilter> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(filter) = stack.pop() {
            match filter {
                Filter::Field(field) => out.push(field),
                Filter::Composite(composite) => {
                    stack.extend(composite.filters.iter().rev());
                }
            }
        }
        out
    }

    /// A composite filter with no field filters anywhere below it.
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Field(_) => false,
            Filter::Composite(composite) => composite.filters.iter().all(Filter::is_empty),
        }
    }
}

impl From<FieldFilter> for Filter {
    fn from(value: FieldFilter) -> Self {
        Filter::Field(value)
    }
}

impl From<CompositeFilter> for Filter {
    fn from(value: CompositeFilter) -> Self {
        Filter::Composite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, op: FilterOperator, value: i64) -> Filter {
        Filter::Field(FieldFilter::new(
            FieldPath::from_dot_separated(name).unwrap(),
            op,
            FirestoreValue::from_integer(value),
        ))
    }

    #[test]
    fn parses_symbols() {
        for op in FilterOperator::ALL {
            assert_eq!(FilterOperator::from_symbol(op.symbol()).unwrap(), op);
        }
        let err = FilterOperator::from_symbol("=~").unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }

    #[test]
    fn conflict_relation_is_symmetric() {
        for a in FilterOperator::ALL {
            for b in FilterOperator::ALL {
                assert_eq!(a.conflicts_with(b), b.conflicts_with(a), "{a} / {b}");
            }
        }
        assert!(FilterOperator::NotEqual.conflicts_with(FilterOperator::NotIn));
        assert!(FilterOperator::In.conflicts_with(FilterOperator::NotIn));
        assert!(!FilterOperator::In.conflicts_with(FilterOperator::In));
        assert!(!FilterOperator::GreaterThan.conflicts_with(FilterOperator::NotEqual));
    }

    #[test]
    fn flattens_in_order() {
        let nested = Filter::Composite(CompositeFilter::new(
            CompositeOperator::Or,
            vec![
                field("a", FilterOperator::Equal, 1),
                Filter::Composite(CompositeFilter::new(
                    CompositeOperator::And,
                    vec![
                        field("b", FilterOperator::Equal, 2),
                        field("c", FilterOperator::Equal, 3),
                    ],
                )),
                field("d", FilterOperator::Equal, 4),
            ],
        ));
        let names: Vec<String> = nested
            .flattened_filters()
            .iter()
            .map(|filter| filter.field().canonical_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert!(!nested.is_empty());
        assert!(Filter::Composite(CompositeFilter::new(CompositeOperator::And, vec![])).is_empty());
    }
}
