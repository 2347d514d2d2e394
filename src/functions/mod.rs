//! Callable function client: request envelope, context tokens, response decoding
//! and streamed results.

mod api;
mod context;
pub mod error;
pub mod serializer;
mod stream;
mod transport;

pub use api::{
    CallableFunction, Functions, FunctionsBuilder, HttpsCallableOptions, DEFAULT_REGION,
    DEFAULT_TIMEOUT_MS,
};
pub use context::{CallContext, ContextProvider};
pub use error::{FunctionsError, FunctionsErrorCode, FunctionsResult};
pub use stream::{CallableStream, StreamEvent};
pub use transport::{
    CallableRequest, CallableResponse, CallableStreamResponse, CallableTransport, ChunkStream,
    HttpCallableTransport,
};
