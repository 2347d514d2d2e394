use std::cmp::Ordering;
use std::collections::btree_map;

use crate::firestore::value::{FirestoreValue, ValueKind};

/// Rank of a value's type in the cross-type sort order used by the backend.
pub(crate) fn type_order(value: &FirestoreValue) -> u8 {
    match value.kind() {
        ValueKind::Null => 0,
        ValueKind::Boolean(_) => 1,
        ValueKind::Integer(_) | ValueKind::Double(_) => 2,
        ValueKind::Timestamp(_) => 3,
        ValueKind::ServerTimestamp(_) => 4,
        ValueKind::String(_) => 5,
        ValueKind::Bytes(_) => 6,
        ValueKind::Reference(_) => 7,
        ValueKind::GeoPoint(_) => 8,
        ValueKind::Array(_) => 9,
        ValueKind::Vector(_) => 10,
        ValueKind::Map(_) => 11,
    }
}

/// Total order over Firestore values.
///
/// Values of different types sort by [`type_order`]. Integers and doubles share a
/// type and compare numerically, with NaN sorting before every other number.
/// Arrays and maps compare element-wise using an explicit stack.
pub(crate) fn compare_values(left: &FirestoreValue, right: &FirestoreValue) -> Ordering {
    let mut stack: Vec<Pending<'_>> = Vec::new();
    let mut next = Some((left, right));
    loop {
        if let Some((left, right)) = next.take() {
            match compare_shallow(left, right) {
                Shallow::Decided(Ordering::Equal) => {}
                Shallow::Decided(ordering) => return ordering,
                Shallow::Descend(pending) => stack.push(pending),
            }
        }
        let Some(top) = stack.last_mut() else {
            return Ordering::Equal;
        };
        match top.advance() {
            Step::Pair(left, right) => next = Some((left, right)),
            Step::Decided(Ordering::Equal) => {
                stack.pop();
            }
            Step::Decided(ordering) => return ordering,
        }
    }
}

/// Two containers of the same type being compared element by element.
enum Pending<'a> {
    Sequence(
        std::slice::Iter<'a, FirestoreValue>,
        std::slice::Iter<'a, FirestoreValue>,
    ),
    Fields(
        btree_map::Iter<'a, String, FirestoreValue>,
        btree_map::Iter<'a, String, FirestoreValue>,
    ),
}

enum Step<'a> {
    Pair(&'a FirestoreValue, &'a FirestoreValue),
    Decided(Ordering),
}

impl<'a> Pending<'a> {
    fn advance(&mut self) -> Step<'a> {
        match self {
            Pending::Sequence(left, right) => match (left.next(), right.next()) {
                (Some(l), Some(r)) => Step::Pair(l, r),
                (Some(_), None) => Step::Decided(Ordering::Greater),
                (None, Some(_)) => Step::Decided(Ordering::Less),
                (None, None) => Step::Decided(Ordering::Equal),
            },
            Pending::Fields(left, right) => match (left.next(), right.next()) {
                (Some((lk, lv)), Some((rk, rv))) => match lk.cmp(rk) {
                    Ordering::Equal => Step::Pair(lv, rv),
                    ordering => Step::Decided(ordering),
                },
                (Some(_), None) => Step::Decided(Ordering::Greater),
                (None, Some(_)) => Step::Decided(Ordering::Less),
                (None, None) => Step::Decided(Ordering::Equal),
            },
        }
    }
}

enum Shallow<'a> {
    Decided(Ordering),
    Descend(Pending<'a>),
}

fn compare_shallow<'a>(left: &'a FirestoreValue, right: &'a FirestoreValue) -> Shallow<'a> {
    let by_type = type_order(left).cmp(&type_order(right));
    if by_type != Ordering::Equal {
        return Shallow::Decided(by_type);
    }

    let ordering = match (left.kind(), right.kind()) {
        (ValueKind::Null, ValueKind::Null) => Ordering::Equal,
        (ValueKind::Boolean(a), ValueKind::Boolean(b)) => a.cmp(b),
        (ValueKind::Integer(a), ValueKind::Integer(b)) => a.cmp(b),
        (ValueKind::Integer(a), ValueKind::Double(b)) => compare_doubles(*a as f64, *b),
        (ValueKind::Double(a), ValueKind::Integer(b)) => compare_doubles(*a, *b as f64),
        (ValueKind::Double(a), ValueKind::Double(b)) => compare_doubles(*a, *b),
        (ValueKind::Timestamp(a), ValueKind::Timestamp(b)) => a.cmp(b),
        (ValueKind::ServerTimestamp(a), ValueKind::ServerTimestamp(b)) => {
            a.local_write_time().cmp(&b.local_write_time())
        }
        (ValueKind::String(a), ValueKind::String(b)) => a.cmp(b),
        (ValueKind::Bytes(a), ValueKind::Bytes(b)) => a.cmp(b),
        (ValueKind::Reference(a), ValueKind::Reference(b)) => a
            .database_id()
            .cmp(b.database_id())
            .then_with(|| a.key().cmp(b.key())),
        (ValueKind::GeoPoint(a), ValueKind::GeoPoint(b)) => {
            compare_doubles(a.latitude(), b.latitude())
                .then_with(|| compare_doubles(a.longitude(), b.longitude()))
        }
        (ValueKind::Array(a), ValueKind::Array(b)) => {
            return Shallow::Descend(Pending::Sequence(a.values().iter(), b.values().iter()))
        }
        (ValueKind::Vector(a), ValueKind::Vector(b)) => a
            .dimension()
            .cmp(&b.dimension())
            .then_with(|| {
                a.values()
                    .iter()
                    .zip(b.values())
                    .map(|(x, y)| compare_doubles(*x, *y))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
        (ValueKind::Map(a), ValueKind::Map(b)) => {
            return Shallow::Descend(Pending::Fields(a.fields().iter(), b.fields().iter()))
        }
        _ => Ordering::Equal,
    };
    Shallow::Decided(ordering)
}

/// Whether two values are equal under [`compare_values`], so `1` and `1.0` match
/// and `0.0` matches `-0.0`.
pub(crate) fn values_equal(left: &FirestoreValue, right: &FirestoreValue) -> bool {
    compare_values(left, right) == Ordering::Equal
}

fn compare_doubles(left: f64, right: f64) -> Ordering {
    match (left.is_nan(), right.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        // -0.0 and 0.0 sort together
        (false, false) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::model::Timestamp;

    #[test]
    fn orders_across_types() {
        let ordered = [
            FirestoreValue::null(),
            FirestoreValue::from_bool(true),
            FirestoreValue::from_double(f64::NAN),
            FirestoreValue::from_integer(-5),
            FirestoreValue::from_double(2.5),
            FirestoreValue::from_timestamp(Timestamp::new(1, 0)),
            FirestoreValue::from_string("a"),
            FirestoreValue::from_bytes(vec![0u8]),
            FirestoreValue::from_array(vec![]),
            FirestoreValue::from_vector(vec![1.0]),
            FirestoreValue::from_map(Default::default()),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(
                compare_values(&pair[0], &pair[1]),
                Ordering::Less,
                "{:?} < {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn mixes_integers_and_doubles() {
        assert_eq!(
            compare_values(
                &FirestoreValue::from_integer(1),
                &FirestoreValue::from_double(1.0)
            ),
            Ordering::Equal
        );
        assert_eq!(
            compare_values(
                &FirestoreValue::from_double(0.0),
                &FirestoreValue::from_double(-0.0)
            ),
            Ordering::Equal
        );
    }

    #[test]
    fn arrays_compare_lexicographically() {
        let short = FirestoreValue::from_array(vec![FirestoreValue::from_integer(1)]);
        let long = FirestoreValue::from_array(vec![
            FirestoreValue::from_integer(1),
            FirestoreValue::from_integer(0),
        ]);
        assert_eq!(compare_values(&short, &long), Ordering::Less);
    }

    #[test]
    fn maps_compare_by_key_then_value() {
        let map = |entries: &[(&str, i64)]| {
            FirestoreValue::from_map(
                entries
                    .iter()
                    .map(|(key, value)| (key.to_string(), FirestoreValue::from_integer(*value)))
                    .collect(),
            )
        };
        assert_eq!(compare_values(&map(&[("a", 2)]), &map(&[("b", 1)])), Ordering::Less);
        assert_eq!(compare_values(&map(&[("a", 2)]), &map(&[("a", 1)])), Ordering::Greater);
        assert_eq!(
            compare_values(&map(&[("a", 1)]), &map(&[("a", 1), ("b", 0)])),
            Ordering::Less
        );
        assert!(values_equal(
            &FirestoreValue::from_array(vec![map(&[("a", 1)])]),
            &FirestoreValue::from_array(vec![FirestoreValue::from_map(
                [("a".to_string(), FirestoreValue::from_double(1.0))].into_iter().collect()
            )])
        ));
    }

    #[test]
    fn compares_deeply_nested_values() {
        const DEPTH: usize = 50_000;
        let build = |leaf: i64| {
            let mut value = FirestoreValue::from_integer(leaf);
            for _ in 0..DEPTH {
                value = FirestoreValue::from_array(vec![value]);
            }
            value
        };
        let low = build(1);
        let high = build(2);
        assert_eq!(compare_values(&low, &high), Ordering::Less);
        assert_eq!(compare_values(&high, &low), Ordering::Greater);
        assert!(values_equal(&low, &low));

        for mut value in [low, high] {
            while let ValueKind::Array(array) = value.into_kind() {
                match array.into_values().pop() {
                    Some(inner) => value = inner,
                    None => break,
                }
            }
        }
    }
}
