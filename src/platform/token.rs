use std::error::Error;
use std::fmt;

use async_trait::async_trait;

/// Error type returned by async token providers when token acquisition fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenError {
    message: String,
}

impl TokenError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_error(err: impl Error) -> Self {
        Self::new(err.to_string())
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for TokenError {}

/// Source of bearer, messaging or App Check tokens.
///
/// `Ok(None)` means no token is available, which callers treat as a normal outcome.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait AsyncTokenProvider: Send + Sync {
    async fn get_token(&self, force_refresh: bool) -> Result<Option<String>, TokenError>;

    /// A token meant for a single use. Defaults to a regular token.
    async fn get_limited_use_token(&self) -> Result<Option<String>, TokenError> {
        self.get_token(false).await
    }
}
