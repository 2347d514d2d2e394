use crate::firestore::value::FirestoreValue;

/// A position in the result order, one component per ordering entry.
///
/// `inclusive` is true for `start_at`/`end_at` and false for
/// `start_after`/`end_before`.
#[derive(Clone, Debug, PartialEq)]
pub struct Bound {
    values: Vec<FirestoreValue>,
    inclusive: bool,
}

impl Bound {
    pub fn new(values: Vec<FirestoreValue>, inclusive: bool) -> Self {
        Self { values, inclusive }
    }

    pub fn values(&self) -> &[FirestoreValue] {
        &self.values
    }

    pub fn inclusive(&self) -> bool {
        self.inclusive
    }
}
