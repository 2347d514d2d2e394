//! Runtime helpers shared by the product modules.

pub mod runtime;
pub mod token;

pub use token::{AsyncTokenProvider, TokenError};
