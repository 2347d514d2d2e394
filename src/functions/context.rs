use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use futures::future::join3;
use log::debug;

use crate::platform::token::{AsyncTokenProvider, TokenError};

/// Metadata that may be attached to callable Function requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallContext {
    pub auth_token: Option<String>,
    pub messaging_token: Option<String>,
    pub app_check_token: Option<String>,
}

/// Gathers the optional tokens sent alongside each callable request.
///
/// Every source is optional. A source that fails or yields an empty token is
/// treated as absent so the call still goes out.
#[derive(Clone, Default)]
pub struct ContextProvider {
    auth: Option<Arc<dyn AsyncTokenProvider>>,
    messaging: Option<Arc<dyn AsyncTokenProvider>>,
    app_check: Option<Arc<dyn AsyncTokenProvider>>,
}

impl Debug for ContextProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextProvider")
            .field("auth", &self.auth.is_some())
            .field("messaging", &self.messaging.is_some())
            .field("app_check", &self.app_check.is_some())
            .finish()
    }
}

impl ContextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth(mut self, provider: Arc<dyn AsyncTokenProvider>) -> Self {
        self.auth = Some(provider);
        self
    }

    pub fn with_messaging(mut self, provider: Arc<dyn AsyncTokenProvider>) -> Self {
        self.messaging = Some(provider);
        self
    }

    pub fn with_app_check(mut self, provider: Arc<dyn AsyncTokenProvider>) -> Self {
        self.app_check = Some(provider);
        self
    }

    /// Fetches all tokens concurrently.
    pub async fn get_context(&self, limited_use_app_check_tokens: bool) -> CallContext {
        let (auth_token, messaging_token, app_check_token) = join3(
            fetch("auth", self.auth.as_deref(), false),
            fetch("messaging", self.messaging.as_deref(), false),
            fetch(
                "app check",
                self.app_check.as_deref(),
                limited_use_app_check_tokens,
            ),
        )
        .await;

        CallContext {
            auth_token,
            messaging_token,
            app_check_token,
        }
    }
}

async fn fetch(
    kind: &str,
    provider: Option<&dyn AsyncTokenProvider>,
    limited_use: bool,
) -> Option<String> {
    let provider = provider?;
    let result: Result<Option<String>, TokenError> = if limited_use {
        provider.get_limited_use_token().await
    } else {
        provider.get_token(false).await
    };
    match result {
        Ok(Some(token)) if !token.is_empty() => Some(token),
        Ok(_) => None,
        Err(err) => {
            debug!("Failed to retrieve {kind} token for callable request: {err}");
            None
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedToken(Result<Option<String>, TokenError>);

    #[async_trait]
    impl AsyncTokenProvider for FixedToken {
        async fn get_token(&self, _force_refresh: bool) -> Result<Option<String>, TokenError> {
            self.0.clone()
        }

        async fn get_limited_use_token(&self) -> Result<Option<String>, TokenError> {
            Ok(Some("limited".into()))
        }
    }

    fn provider(result: Result<Option<String>, TokenError>) -> Arc<dyn AsyncTokenProvider> {
        Arc::new(FixedToken(result))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_provider_yields_empty_context() {
        let context = ContextProvider::new().get_context(false).await;
        assert_eq!(context, CallContext::default());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn collects_every_token() {
        let context = ContextProvider::new()
            .with_auth(provider(Ok(Some("auth".into()))))
            .with_messaging(provider(Ok(Some("iid".into()))))
            .with_app_check(provider(Ok(Some("app-check".into()))))
            .get_context(false)
            .await;
        assert_eq!(context.auth_token.as_deref(), Some("auth"));
        assert_eq!(context.messaging_token.as_deref(), Some("iid"));
        assert_eq!(context.app_check_token.as_deref(), Some("app-check"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failures_and_empty_tokens_become_none() {
        let context = ContextProvider::new()
            .with_auth(provider(Err(TokenError::new("signed out"))))
            .with_messaging(provider(Ok(Some(String::new()))))
            .with_app_check(provider(Ok(None)))
            .get_context(false)
            .await;
        assert_eq!(context, CallContext::default());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn limited_use_app_check_token() {
        let context = ContextProvider::new()
            .with_app_check(provider(Ok(Some("regular".into()))))
            .get_context(true)
            .await;
        assert_eq!(context.app_check_token.as_deref(), Some("limited"));
    }
}
