use crate::firestore::value::value::doubles_equal;

/// A fixed-dimension vector of doubles, used for nearest neighbour search.
#[derive(Clone, Debug)]
pub struct VectorValue {
    values: Vec<f64>,
}

impl VectorValue {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

impl PartialEq for VectorValue {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(left, right)| doubles_equal(*left, *right))
    }
}

impl From<Vec<f64>> for VectorValue {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_elementwise() {
        let a = VectorValue::new(vec![1.0, 2.0]);
        assert_eq!(a, VectorValue::from(vec![1.0, 2.0]));
        assert_ne!(a, VectorValue::new(vec![1.0]));
        assert_eq!(a.dimension(), 2);
    }
}
