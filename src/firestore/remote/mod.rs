pub mod connection;
pub mod datastore;
pub mod rpc_error;
pub mod serializer;
pub mod structured_query;

pub use connection::{Connection, ConnectionBuilder, RequestContext};
pub use datastore::{Datastore, HttpDatastore, HttpDatastoreBuilder, InMemoryDatastore};
pub use rpc_error::map_http_error;
pub use serializer::JsonProtoSerializer;
pub use structured_query::encode_structured_query;
