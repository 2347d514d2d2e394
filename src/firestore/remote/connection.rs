use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value as JsonValue;

use crate::firestore::error::{internal_error, FirestoreResult};
use crate::firestore::model::DatabaseId;

use super::rpc_error::map_http_error;

const FIRESTORE_API_HOST: &str = "https://firestore.googleapis.com";
const FIRESTORE_API_VERSION: &str = "v1";
const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";

/// JSON-over-HTTP access to one database's REST endpoints.
#[derive(Clone, Debug)]
pub struct Connection {
    client: Client,
    base_url: String,
}

#[derive(Clone, Debug)]
pub struct ConnectionBuilder {
    database_id: DatabaseId,
    client: Option<Client>,
    emulator_host: Option<String>,
}

#[derive(Default, Clone, Debug)]
pub struct RequestContext {
    pub auth_token: Option<String>,
    pub request_timeout: Option<Duration>,
}

impl ConnectionBuilder {
    pub fn new(database_id: DatabaseId) -> Self {
        Self {
            database_id,
            client: None,
            emulator_host: std::env::var(EMULATOR_HOST_ENV).ok(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Targets a local emulator at `host` (`hostname:port`) over plain HTTP.
    pub fn with_emulator_host(mut self, host: impl Into<String>) -> Self {
        self.emulator_host = Some(host.into());
        self
    }

    pub fn build(self) -> FirestoreResult<Connection> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .build()
                .map_err(|err| internal_error(err.to_string()))?,
        };
        let base_url = build_base_url(&self.database_id, self.emulator_host.as_deref());
        Ok(Connection { client, base_url })
    }
}

impl Connection {
    pub fn builder(database_id: DatabaseId) -> ConnectionBuilder {
        ConnectionBuilder::new(database_id)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn invoke_json(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        context: &RequestContext,
    ) -> FirestoreResult<JsonValue> {
        let (status, text) = self.send(method, path, body, context).await?;
        if status.is_success() {
            parse_body(&text)
        } else {
            Err(map_http_error(status, &text))
        }
    }

    /// Like [`Connection::invoke_json`] but reports `404` as `None`.
    pub async fn invoke_json_optional(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        context: &RequestContext,
    ) -> FirestoreResult<Option<JsonValue>> {
        let (status, text) = self.send(method, path, body, context).await?;
        if status.is_success() {
            parse_body(&text).map(Some)
        } else if status == StatusCode::NOT_FOUND {
            Ok(None)
        } else {
            Err(map_http_error(status, &text))
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        context: &RequestContext,
    ) -> FirestoreResult<(StatusCode, String)> {
        let mut request = self.build_request(method, path, context);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|err| internal_error(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| internal_error(err.to_string()))?;
        Ok((status, text))
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        context: &RequestContext,
    ) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut builder = self.client.request(method, url);
        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(timeout) = context.request_timeout {
                builder = builder.timeout(timeout);
            }
        }
        if let Some(token) = context.auth_token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        builder.header("Content-Type", "application/json")
    }
}

fn parse_body(text: &str) -> FirestoreResult<JsonValue> {
    if text.is_empty() {
        Ok(JsonValue::Null)
    } else {
        serde_json::from_str(text).map_err(|err| internal_error(err.to_string()))
    }
}

fn build_base_url(database_id: &DatabaseId, emulator_host: Option<&str>) -> String {
    let host = match emulator_host {
        Some(host) => format!("http://{host}"),
        None => FIRESTORE_API_HOST.to_string(),
    };
    format!(
        "{host}/{FIRESTORE_API_VERSION}/projects/{}/databases/{}",
        database_id.project_id(),
        database_id.database(),
    )
}
