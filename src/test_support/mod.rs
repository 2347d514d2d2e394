//! Test utilities shared across crate-level unit tests.

pub mod firebase;
#[cfg(not(target_arch = "wasm32"))]
pub mod http;

pub use firebase::test_firebase_app;
#[cfg(not(target_arch = "wasm32"))]
pub use http::try_start_mock_server;
