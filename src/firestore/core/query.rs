use crate::firestore::core::{Bound, FieldFilter, Filter, OrderBy, OrderDirection};
use crate::firestore::error::{invalid_argument, unimplemented, FirestoreResult};
use crate::firestore::model::{DocumentKey, FieldPath, ResourcePath};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LimitType {
    #[default]
    First,
    Last,
}

/// Immutable query target: base path, filters, explicit ordering, limit and cursors.
///
/// Every `with_*` method returns a new definition and leaves `self` untouched, so
/// partially built queries can be shared as the base of several derived queries.
/// Equality is structural over the stored fields only; the normalized ordering is
/// derived on demand.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryDefinition {
    path: ResourcePath,
    collection_group: Option<String>,
    filters: Vec<Filter>,
    explicit_order_by: Vec<OrderBy>,
    limit: Option<u32>,
    limit_type: LimitType,
    start_at: Option<Bound>,
    end_at: Option<Bound>,
}

impl QueryDefinition {
    /// A query over the collection at `path`.
    pub fn new(path: ResourcePath) -> Self {
        Self {
            path,
            collection_group: None,
            filters: Vec::new(),
            explicit_order_by: Vec::new(),
            limit: None,
            limit_type: LimitType::First,
            start_at: None,
            end_at: None,
        }
    }

    /// A query over every collection named `collection_id`, at any depth.
    pub fn new_collection_group(collection_id: impl Into<String>) -> Self {
        let mut definition = Self::new(ResourcePath::root());
        definition.collection_group = Some(collection_id.into());
        definition
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn collection_group(&self) -> Option<&str> {
        self.collection_group.as_deref()
    }

    pub fn is_collection_group(&self) -> bool {
        self.collection_group.is_some()
    }

    /// The collection identifier the query reads from.
    pub fn collection_id(&self) -> &str {
        match &self.collection_group {
            Some(group) => group,
            None => self.path.last_segment().unwrap_or_default(),
        }
    }

    /// Resource path of the parent document (root for top level collections).
    pub fn parent_path(&self) -> ResourcePath {
        if self.is_collection_group() {
            self.path.clone()
        } else {
            self.path.without_last()
        }
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn flattened_filters(&self) -> Vec<&FieldFilter> {
        self.filters
            .iter()
            .flat_map(|filter| filter.flattened_filters())
            .collect()
    }

    pub fn explicit_order_by(&self) -> &[OrderBy] {
        &self.explicit_order_by
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn limit_type(&self) -> LimitType {
        self.limit_type
    }

    pub fn start_at(&self) -> Option<&Bound> {
        self.start_at.as_ref()
    }

    pub fn end_at(&self) -> Option<&Bound> {
        self.end_at.as_ref()
    }

    /// Adds a filter after checking every leaf against the operators already present.
    ///
    /// Leaves are checked one at a time, so conflicts inside a single composite are
    /// caught too. A composite without any leaves leaves the query unchanged.
    pub fn with_added_filter(&self, filter: Filter) -> FirestoreResult<Self> {
        if filter.is_empty() {
            return Ok(self.clone());
        }

        let mut present: Vec<_> = self
            .flattened_filters()
            .iter()
            .map(|existing| existing.operator())
            .collect();
        for leaf in filter.flattened_filters() {
            let operator = leaf.operator();
            if let Some(conflict) = present
                .iter()
                .copied()
                .find(|existing| existing.conflicts_with(operator))
            {
                return Err(if conflict == operator {
                    invalid_argument(format!(
                        "Invalid query. You cannot use more than one '{operator}' filter."
                    ))
                } else {
                    invalid_argument(format!(
                        "Invalid query. You cannot use '{operator}' filters with '{conflict}' filters."
                    ))
                });
            }
            present.push(operator);
        }

        let mut next = self.clone();
        next.filters.push(filter);
        Ok(next)
    }

    /// Appends an explicit ordering. Rejected once a cursor has been attached.
    pub fn with_added_order_by(&self, order_by: OrderBy) -> FirestoreResult<Self> {
        if self.start_at.is_some() {
            return Err(invalid_argument(
                "Invalid query. You must not call startAt() or startAfter() before calling orderBy().",
            ));
        }
        if self.end_at.is_some() {
            return Err(invalid_argument(
                "Invalid query. You must not call endAt() or endBefore() before calling orderBy().",
            ));
        }
        let mut next = self.clone();
        next.explicit_order_by.push(order_by);
        Ok(next)
    }

    pub fn with_limit(&self, limit: Option<u32>, limit_type: LimitType) -> Self {
        let mut next = self.clone();
        next.limit = limit;
        next.limit_type = limit_type;
        next
    }

    pub fn with_start_at(&self, bound: Bound) -> Self {
        let mut next = self.clone();
        next.start_at = Some(bound);
        next
    }

    pub fn with_end_at(&self, bound: Bound) -> Self {
        let mut next = self.clone();
        next.end_at = Some(bound);
        next
    }

    /// Explicit ordering plus a trailing key ordering, unless the key is already
    /// ordered explicitly. The key entry inherits the last explicit direction.
    pub fn normalized_order_by(&self) -> Vec<OrderBy> {
        let mut order_by = self.explicit_order_by.clone();
        let has_key = order_by.iter().any(|order| order.field().is_document_id());
        if !has_key {
            let direction = order_by
                .last()
                .map(|order| order.direction())
                .unwrap_or(OrderDirection::Ascending);
            order_by.push(OrderBy::new(FieldPath::document_id(), direction));
        }
        order_by
    }

    /// Ordering sent to the backend. Limit-to-last queries run reversed.
    pub fn request_order_by(&self) -> Vec<OrderBy> {
        let normalized = self.normalized_order_by();
        match self.limit_type {
            LimitType::First => normalized,
            LimitType::Last => normalized.iter().map(OrderBy::flipped).collect(),
        }
    }

    pub fn request_start_at(&self) -> Option<&Bound> {
        match self.limit_type {
            LimitType::First => self.start_at.as_ref(),
            LimitType::Last => self.end_at.as_ref(),
        }
    }

    pub fn request_end_at(&self) -> Option<&Bound> {
        match self.limit_type {
            LimitType::First => self.end_at.as_ref(),
            LimitType::Last => self.start_at.as_ref(),
        }
    }

    /// Checked right before execution, since an ordering may be added after the limit.
    pub fn validate_has_explicit_order_by_for_limit_to_last(&self) -> FirestoreResult<()> {
        if self.limit_type == LimitType::Last && self.explicit_order_by.is_empty() {
            return Err(unimplemented(
                "limitToLast() queries require specifying at least one orderBy() clause",
            ));
        }
        Ok(())
    }

    /// Whether the document at `key` lives in the collection(s) this query reads.
    pub fn matches_path(&self, key: &DocumentKey) -> bool {
        match &self.collection_group {
            Some(group) => key.collection_group() == group && self.path.is_prefix_of(key.path()),
            None => key.collection_path() == self.path,
        }
    }
}
