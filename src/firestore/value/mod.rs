mod array_value;
mod bytes_value;
mod map_value;
mod ordering;
mod value;
mod vector_value;

pub use array_value::ArrayValue;
pub use bytes_value::BytesValue;
pub use map_value::MapValue;
pub(crate) use ordering::{compare_values, type_order, values_equal};
pub use value::{FirestoreValue, ReferenceValue, ServerTimestampValue, ValueKind};
pub use vector_value::VectorValue;
