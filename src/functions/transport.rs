use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream};
#[cfg(not(target_arch = "wasm32"))]
use futures::stream::StreamExt;
use log::warn;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value as JsonValue;

use crate::functions::error::{internal_error, FunctionsError, FunctionsResult};

#[derive(Clone, Debug)]
pub struct CallableRequest {
    pub url: String,
    pub payload: JsonValue,
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
}

impl CallableRequest {
    pub fn new(url: impl Into<String>, payload: JsonValue, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            payload,
            timeout,
            headers: HashMap::new(),
        }
    }
}

/// Raw outcome of a callable request.
///
/// `status` is `0` when the request never produced an HTTP response. `body` is
/// `None` when the response was empty or not valid JSON.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallableResponse {
    pub status: u16,
    pub body: Option<JsonValue>,
}

/// Body of a streaming response, delivered as it arrives.
#[cfg(not(target_arch = "wasm32"))]
pub type ChunkStream = Pin<Box<dyn Stream<Item = FunctionsResult<Vec<u8>>> + Send>>;
#[cfg(target_arch = "wasm32")]
pub type ChunkStream = Pin<Box<dyn Stream<Item = FunctionsResult<Vec<u8>>>>>;

/// Raw outcome of a streaming callable request.
///
/// `status` is `0` when the request never produced an HTTP response, in which
/// case `body` is empty.
pub struct CallableStreamResponse {
    pub status: u16,
    pub body: ChunkStream,
}

impl CallableStreamResponse {
    pub fn new(status: u16, body: ChunkStream) -> Self {
        Self { status, body }
    }

    /// A response whose whole body is already known.
    pub fn from_chunks(status: u16, chunks: Vec<Vec<u8>>) -> Self {
        let chunks = chunks.into_iter().map(Ok::<_, FunctionsError>);
        Self::new(status, Box::pin(stream::iter(chunks)))
    }
}

impl std::fmt::Debug for CallableStreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableStreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Sends callable requests. Implementations report failures through the
/// response status rather than an error.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait CallableTransport: Send + Sync {
    async fn invoke(&self, request: CallableRequest) -> CallableResponse;

    /// Sends the request and hands back the body without buffering it.
    async fn invoke_stream(&self, request: CallableRequest) -> CallableStreamResponse;
}

/// Default transport backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpCallableTransport {
    client: Client,
}

impl HttpCallableTransport {
    pub fn new() -> FunctionsResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|err| internal_error(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl CallableTransport for HttpCallableTransport {
    async fn invoke(&self, request: CallableRequest) -> CallableResponse {
        let CallableRequest {
            url,
            payload,
            headers,
            ..
        } = request;

        let response = match self
            .client
            .post(&url)
            .headers(build_headers(&headers))
            .body(payload.to_string())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("Callable request to {url} failed before a response arrived: {err}");
                return CallableResponse {
                    status: 0,
                    body: None,
                };
            }
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice::<JsonValue>(&bytes).ok(),
            _ => None,
        };
        CallableResponse { status, body }
    }

    async fn invoke_stream(&self, request: CallableRequest) -> CallableStreamResponse {
        let CallableRequest {
            url,
            payload,
            headers,
            ..
        } = request;

        let response = match self
            .client
            .post(&url)
            .headers(build_headers(&headers))
            .body(payload.to_string())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("Streaming callable request to {url} failed before a response arrived: {err}");
                return CallableStreamResponse::from_chunks(0, Vec::new());
            }
        };

        let status = response.status().as_u16();
        CallableStreamResponse::new(status, response_chunks(response, url).await)
    }
}

#[cfg(not(target_arch = "wasm32"))]
async fn response_chunks(response: reqwest::Response, url: String) -> ChunkStream {
    Box::pin(response.bytes_stream().map(move |chunk| {
        chunk.map(|bytes| bytes.to_vec()).map_err(|err| {
            warn!("Reading the streaming response from {url} failed: {err}");
            internal_error("internal")
        })
    }))
}

// Browsers hand the body over in one piece without the `stream` feature.
#[cfg(target_arch = "wasm32")]
async fn response_chunks(response: reqwest::Response, url: String) -> ChunkStream {
    let chunk = response.bytes().await.map(|bytes| bytes.to_vec()).map_err(|err| {
        warn!("Reading the streaming response from {url} failed: {err}");
        internal_error("internal")
    });
    Box::pin(stream::iter(std::iter::once(chunk)))
}

fn build_headers(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (key, value) in headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!("Dropping invalid callable header `{key}`"),
        }
    }
    map
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::test_support::try_start_mock_server;
    use httpmock::Method::POST;
    use serde_json::json;

    #[tokio::test(flavor = "current_thread")]
    async fn posts_payload_with_headers() {
        let Some(server) = try_start_mock_server("posts_payload_with_headers") else {
            return;
        };
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/echo")
                .header("x-custom", "yes")
                .json_body(json!({ "data": 1 }));
            then.status(200).body("not json");
        });

        let transport = HttpCallableTransport::new().unwrap();
        let mut request =
            CallableRequest::new(server.url("/echo"), json!({ "data": 1 }), Duration::from_secs(5));
        request.headers.insert("X-Custom".into(), "yes".into());
        let response = transport.invoke(request).await;

        mock.assert();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn streams_body_chunks() {
        let Some(server) = try_start_mock_server("streams_body_chunks") else {
            return;
        };
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/stream")
                .header("accept", "text/event-stream");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("data: {\"message\":1}\n\ndata: {\"result\":2}\n\n");
        });

        let transport = HttpCallableTransport::new().unwrap();
        let mut request =
            CallableRequest::new(server.url("/stream"), json!({ "data": 1 }), Duration::from_secs(5));
        request
            .headers
            .insert("Accept".into(), "text/event-stream".into());
        let response = transport.invoke_stream(request).await;
        assert_eq!(response.status, 200);

        let chunks: Vec<_> = response.body.collect().await;
        let body: Vec<u8> = chunks.into_iter().flat_map(Result::unwrap).collect();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "data: {\"message\":1}\n\ndata: {\"result\":2}\n\n"
        );
        mock.assert();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unreachable_host_reports_status_zero() {
        let transport = HttpCallableTransport::new().unwrap();
        let request = CallableRequest::new(
            "http://127.0.0.1:9/unreachable",
            json!({ "data": null }),
            Duration::from_secs(5),
        );
        let response = transport.invoke(request.clone()).await;
        assert_eq!(response.status, 0);
        assert!(response.body.is_none());

        let response = transport.invoke_stream(request).await;
        assert_eq!(response.status, 0);
        assert!(response.body.collect::<Vec<_>>().await.is_empty());
    }
}
