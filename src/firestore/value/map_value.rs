use std::collections::BTreeMap;

use crate::firestore::model::FieldPath;
use crate::firestore::value::FirestoreValue;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct MapValue {
    fields: BTreeMap<String, FirestoreValue>,
}

impl MapValue {
    pub fn new(fields: BTreeMap<String, FirestoreValue>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, FirestoreValue> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, FirestoreValue> {
        self.fields
    }

    /// Looks up a possibly nested field. Returns `None` when any segment is absent
    /// or an intermediate value is not a map.
    pub fn get(&self, path: &FieldPath) -> Option<&FirestoreValue> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.fields.get(first)?;
        for segment in rest {
            current = current.as_map()?.fields.get(segment)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_map_entries() {
        let mut map = BTreeMap::new();
        map.insert("foo".to_string(), FirestoreValue::from_integer(1));
        let value = MapValue::new(map.clone());
        assert_eq!(value.fields().get("foo"), map.get("foo"));
    }

    #[test]
    fn resolves_nested_paths() {
        let mut inner = BTreeMap::new();
        inner.insert("city".to_string(), FirestoreValue::from_string("SF"));
        let mut outer = BTreeMap::new();
        outer.insert("address".to_string(), FirestoreValue::from_map(inner));
        outer.insert("name".to_string(), FirestoreValue::null());
        let map = MapValue::new(outer);

        let city = FieldPath::from_dot_separated("address.city").unwrap();
        assert_eq!(map.get(&city), Some(&FirestoreValue::from_string("SF")));

        let name_city = FieldPath::from_dot_separated("name.city").unwrap();
        assert_eq!(map.get(&name_city), None);

        let name = FieldPath::from_dot_separated("name").unwrap();
        assert_eq!(map.get(&name), Some(&FirestoreValue::null()));
    }
}
