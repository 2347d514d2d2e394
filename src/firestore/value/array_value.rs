use crate::firestore::value::{values_equal, FirestoreValue};

#[derive(Clone, Debug, PartialEq)]
pub struct ArrayValue {
    values: Vec<FirestoreValue>,
}

impl ArrayValue {
    pub fn new(values: Vec<FirestoreValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FirestoreValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Membership as the backend evaluates it: numbers match across integer and
    /// double, and `0.0` matches `-0.0`.
    pub fn contains(&self, needle: &FirestoreValue) -> bool {
        self.values
            .iter()
            .any(|candidate| values_equal(candidate, needle))
    }

    pub fn into_values(self) -> Vec<FirestoreValue> {
        self.values
    }
}
