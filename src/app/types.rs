use std::sync::Arc;

use crate::app::constants::DEFAULT_ENTRY_NAME;

/// Project level configuration shared by every product client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FirebaseOptions {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub project_id: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FirebaseAppSettings {
    pub name: Option<String>,
}

/// A named set of [`FirebaseOptions`].
///
/// Apps are plain values: product clients take one by reference when they are
/// built and keep whatever they need from it. Nothing is registered globally.
#[derive(Clone, Debug)]
pub struct FirebaseApp {
    inner: Arc<FirebaseAppInner>,
}

#[derive(Debug)]
struct FirebaseAppInner {
    name: String,
    options: FirebaseOptions,
}

impl FirebaseApp {
    pub fn new(options: FirebaseOptions, settings: FirebaseAppSettings) -> Self {
        let name = settings
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_ENTRY_NAME.to_string());
        Self {
            inner: Arc::new(FirebaseAppInner { name, options }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> &FirebaseOptions {
        &self.inner.options
    }

    /// Returns the configured project id, if any.
    pub fn project_id(&self) -> Option<&str> {
        self.inner.options.project_id.as_deref()
    }
}
