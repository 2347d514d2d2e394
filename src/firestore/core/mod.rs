//! Immutable query representation shared by the public API and the wire encoders.

mod bound;
mod filter;
mod order_by;
mod query;

pub use bound::Bound;
pub use filter::{CompositeFilter, CompositeOperator, FieldFilter, Filter, FilterOperator};
pub use order_by::{OrderBy, OrderDirection};
pub use query::{LimitType, QueryDefinition};
