use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{select, Either, FutureExt, Shared};
use futures::stream::StreamExt;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use url::Url;

use crate::app::FirebaseApp;
use crate::functions::context::ContextProvider;
use crate::functions::error::{
    deadline_exceeded, deleted_error, error_for_response, internal_error, invalid_argument,
    FunctionsResult,
};
use crate::functions::serializer::{decode, encode};
use crate::functions::stream::CallableStream;
use crate::functions::transport::{
    CallableRequest, CallableResponse, CallableTransport, ChunkStream, HttpCallableTransport,
};
use crate::platform::runtime::sleep;

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_TIMEOUT_MS: u64 = 70_000;

const CLOUD_WORKSTATIONS_SUFFIX: &str = ".cloudworkstations.dev";

/// Per-callable settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpsCallableOptions {
    /// Upper bound for a single call. Defaults to [`DEFAULT_TIMEOUT_MS`].
    pub timeout: Option<Duration>,
    pub limited_use_app_check_tokens: bool,
}

impl HttpsCallableOptions {
    fn timeout(&self) -> Duration {
        self.timeout
            .unwrap_or_else(|| Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

/// Client entry point for invoking HTTPS callable functions.
///
/// Cloning is cheap; clones share the endpoint, the transport and the
/// cancellation signal raised by [`Functions::delete`].
#[derive(Clone)]
pub struct Functions {
    inner: Arc<FunctionsInner>,
}

struct FunctionsInner {
    app: FirebaseApp,
    endpoint: Endpoint,
    context: ContextProvider,
    transport: Arc<dyn CallableTransport>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
    cancelled: Shared<oneshot::Receiver<()>>,
}

impl std::fmt::Debug for Functions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Functions")
            .field("app", &self.inner.app.name())
            .field("endpoint", &self.inner.endpoint)
            .field("context", &self.inner.context)
            .finish()
    }
}

impl Functions {
    /// Builds a client that talks to `region_or_domain` over HTTP.
    ///
    /// A value that parses as a URL is used as a custom domain and leaves the
    /// region at [`DEFAULT_REGION`]; anything else is taken as the region.
    pub fn new(app: FirebaseApp, region_or_domain: Option<&str>) -> FunctionsResult<Self> {
        Self::builder(app)
            .with_region_or_domain(region_or_domain)
            .build()
    }

    pub fn builder(app: FirebaseApp) -> FunctionsBuilder {
        FunctionsBuilder {
            app,
            region_or_domain: None,
            context: ContextProvider::default(),
            transport: None,
        }
    }

    pub fn app(&self) -> &FirebaseApp {
        &self.inner.app
    }

    pub fn region(&self) -> &str {
        &self.inner.endpoint.region
    }

    pub fn custom_domain(&self) -> Option<&str> {
        self.inner.endpoint.custom_domain.as_deref()
    }

    /// Returns a typed callable reference for the function called `name`.
    pub fn https_callable<Request, Response>(
        &self,
        name: &str,
        options: HttpsCallableOptions,
    ) -> FunctionsResult<CallableFunction<Request, Response>>
    where
        Request: Serialize,
        Response: DeserializeOwned,
    {
        let name = name.trim().trim_matches('/');
        if name.is_empty() {
            return Err(invalid_argument("Function name must not be empty"));
        }
        Ok(CallableFunction::new(
            self.clone(),
            Target::Name(name.to_string()),
            options,
        ))
    }

    /// Returns a typed callable reference for a function deployed at `url`.
    pub fn https_callable_from_url<Request, Response>(
        &self,
        url: &str,
        options: HttpsCallableOptions,
    ) -> FunctionsResult<CallableFunction<Request, Response>>
    where
        Request: Serialize,
        Response: DeserializeOwned,
    {
        let parsed = Url::parse(url.trim())
            .map_err(|err| invalid_argument(format!("Invalid callable URL `{url}`: {err}")))?;
        Ok(CallableFunction::new(
            self.clone(),
            Target::Url(parsed.to_string()),
            options,
        ))
    }

    /// Routes every subsequent call to a local emulator.
    pub fn connect_functions_emulator(&self, host: &str, port: u16) {
        let scheme = if host.ends_with(CLOUD_WORKSTATIONS_SUFFIX) {
            "https"
        } else {
            "http"
        };
        *self.inner.endpoint.emulator_origin() = Some(format!("{scheme}://{host}:{port}"));
    }

    /// Cancels every in-flight call and fails all later ones with `Cancelled`.
    ///
    /// There is no way to undo this.
    pub fn delete(&self) {
        let sender = self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }

    fn callable_url(&self, name: &str) -> FunctionsResult<String> {
        let project_id = self.inner.app.project_id().ok_or_else(|| {
            invalid_argument("FirebaseOptions.project_id is required to call Functions")
        })?;
        Ok(self.inner.endpoint.callable_url(project_id, name))
    }

    async fn send(&self, request: CallableRequest) -> FunctionsResult<CallableResponse> {
        let url = request.url.clone();
        let timeout = request.timeout;
        self.race(&url, timeout, self.inner.transport.invoke(request))
            .await
    }

    /// Races `network` against the cancellation signal and the timeout.
    async fn race<F>(&self, url: &str, timeout: Duration, network: F) -> FunctionsResult<F::Output>
    where
        F: Future + Unpin,
    {
        let timer = Box::pin(sleep(timeout));
        let cancelled = self.inner.cancelled.clone();

        match select(cancelled, select(network, timer)).await {
            Either::Left(_) => {
                debug!("Callable request to {url} cancelled because the client was deleted");
                Err(deleted_error())
            }
            Either::Right((Either::Left((output, _)), _)) => Ok(output),
            Either::Right((Either::Right(_), _)) => {
                debug!("Callable request to {url} timed out; any late response is discarded");
                Err(deadline_exceeded())
            }
        }
    }
}

/// Configures a [`Functions`] client before it is shared.
pub struct FunctionsBuilder {
    app: FirebaseApp,
    region_or_domain: Option<String>,
    context: ContextProvider,
    transport: Option<Arc<dyn CallableTransport>>,
}

impl FunctionsBuilder {
    pub fn with_region_or_domain(mut self, region_or_domain: Option<&str>) -> Self {
        self.region_or_domain = region_or_domain.map(str::to_string);
        self
    }

    pub fn with_context_provider(mut self, context: ContextProvider) -> Self {
        self.context = context;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn CallableTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> FunctionsResult<Functions> {
        let transport: Arc<dyn CallableTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpCallableTransport::new()?),
        };
        let (sender, receiver) = oneshot::channel();
        Ok(Functions {
            inner: Arc::new(FunctionsInner {
                app: self.app,
                endpoint: Endpoint::new(self.region_or_domain.as_deref()),
                context: self.context,
                transport,
                cancel: Mutex::new(Some(sender)),
                cancelled: receiver.shared(),
            }),
        })
    }
}

#[derive(Clone, Debug)]
enum Target {
    Name(String),
    Url(String),
}

/// Callable function handle that can be invoked with typed payloads.
pub struct CallableFunction<Request, Response> {
    functions: Functions,
    target: Target,
    options: HttpsCallableOptions,
    _marker: PhantomData<fn(&Request) -> Response>,
}

impl<Request, Response> Clone for CallableFunction<Request, Response> {
    fn clone(&self) -> Self {
        Self {
            functions: self.functions.clone(),
            target: self.target.clone(),
            options: self.options.clone(),
            _marker: PhantomData,
        }
    }
}

impl<Request, Response> std::fmt::Debug for CallableFunction<Request, Response> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableFunction")
            .field("target", &self.target)
            .field("options", &self.options)
            .finish()
    }
}

impl<Request, Response> CallableFunction<Request, Response>
where
    Request: Serialize,
    Response: DeserializeOwned,
{
    fn new(functions: Functions, target: Target, options: HttpsCallableOptions) -> Self {
        Self {
            functions,
            target,
            options,
            _marker: PhantomData,
        }
    }

    /// Invokes the function and decodes its result.
    ///
    /// The payload is sent as `{ "data": ... }`. The response must carry the
    /// result under `data` (or the older `result` key); any error the backend
    /// reports is mapped to a [`FunctionsError`](crate::functions::FunctionsError).
    pub async fn call_async(&self, data: &Request) -> FunctionsResult<Response> {
        let request = self.build_request(data).await?;
        let response = self.functions.send(request).await?;
        extract_data(response)
    }

    /// Invokes the function and yields what it streams back as server-sent events.
    ///
    /// Every `message` the function sends becomes a [`StreamEvent::Chunk`] and
    /// its return value the closing [`StreamEvent::Result`]. The timeout bounds
    /// the wait for the response headers and then the gap between two pieces of
    /// the body. Deleting the client, or dropping every handle to it, ends the
    /// stream with `Cancelled`.
    ///
    /// [`StreamEvent::Chunk`]: crate::functions::StreamEvent::Chunk
    /// [`StreamEvent::Result`]: crate::functions::StreamEvent::Result
    pub async fn stream<Chunk>(
        &self,
        data: &Request,
    ) -> FunctionsResult<CallableStream<Chunk, Response>>
    where
        Chunk: DeserializeOwned,
    {
        let mut request = self.build_request(data).await?;
        request
            .headers
            .insert("Accept".to_string(), "text/event-stream".to_string());
        let url = request.url.clone();
        let timeout = request.timeout;

        let response = self
            .functions
            .race(&url, timeout, self.functions.inner.transport.invoke_stream(request))
            .await?;
        if !(200..300).contains(&response.status) {
            let body = self
                .functions
                .race(&url, timeout, Box::pin(read_json_body(response.body)))
                .await?;
            return Err(error_for_response(response.status, body.as_ref())
                .unwrap_or_else(|| internal_error("internal")));
        }

        Ok(CallableStream::new(
            response.body,
            timeout,
            self.functions.inner.cancelled.clone(),
            url,
        ))
    }

    async fn build_request(&self, data: &Request) -> FunctionsResult<CallableRequest> {
        let url = self.url()?;
        let body = json!({ "data": encode(data)? });

        let context = self
            .functions
            .inner
            .context
            .get_context(self.options.limited_use_app_check_tokens)
            .await;
        let mut request = CallableRequest::new(url, body, self.options.timeout());
        request
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        if let Some(token) = context.auth_token {
            request
                .headers
                .insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        if let Some(token) = context.messaging_token {
            request
                .headers
                .insert("Firebase-Instance-ID-Token".to_string(), token);
        }
        if let Some(token) = context.app_check_token {
            request
                .headers
                .insert("X-Firebase-AppCheck".to_string(), token);
        }
        Ok(request)
    }

    /// The resolved endpoint this callable posts to.
    pub fn url(&self) -> FunctionsResult<String> {
        match &self.target {
            Target::Name(name) => self.functions.callable_url(name),
            Target::Url(url) => Ok(url.clone()),
        }
    }

    pub fn options(&self) -> &HttpsCallableOptions {
        &self.options
    }
}

/// Collects an error body; `None` when it is empty or not JSON.
async fn read_json_body(body: ChunkStream) -> Option<JsonValue> {
    let chunks: Vec<_> = body.collect().await;
    let mut bytes = Vec::new();
    for chunk in chunks {
        bytes.extend(chunk.ok()?);
    }
    serde_json::from_slice(&bytes).ok()
}

fn extract_data<Response>(response: CallableResponse) -> FunctionsResult<Response>
where
    Response: DeserializeOwned,
{
    if let Some(error) = error_for_response(response.status, response.body.as_ref()) {
        return Err(error);
    }

    let mut body = match response.body {
        Some(JsonValue::Object(map)) => map,
        _ => return Err(internal_error("Response is not valid JSON object.")),
    };
    // A null `data` is a successful call that returned nothing.
    let data = match body.remove("data") {
        Some(data) => data,
        None => body
            .remove("result")
            .ok_or_else(|| internal_error("Response is missing data field."))?,
    };

    let decoded = decode(&data)?;
    serde_json::from_value(decoded).map_err(|err| {
        internal_error(format!(
            "Failed to deserialize callable response payload: {err}"
        ))
    })
}

#[derive(Debug)]
struct Endpoint {
    region: String,
    custom_domain: Option<String>,
    emulator_origin: Mutex<Option<String>>,
}

impl Endpoint {
    fn new(region_or_domain: Option<&str>) -> Self {
        let identifier = region_or_domain
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let (region, custom_domain) = match identifier {
            Some(raw) => match Url::parse(raw) {
                Ok(url) => {
                    let mut domain = url.origin().ascii_serialization();
                    if url.path() != "/" {
                        domain.push_str(url.path().trim_end_matches('/'));
                    }
                    (DEFAULT_REGION.to_string(), Some(domain))
                }
                Err(_) => (raw.to_string(), None),
            },
            None => (DEFAULT_REGION.to_string(), None),
        };
        Self {
            region,
            custom_domain,
            emulator_origin: Mutex::new(None),
        }
    }

    fn emulator_origin(&self) -> MutexGuard<'_, Option<String>> {
        self.emulator_origin
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn callable_url(&self, project_id: &str, name: &str) -> String {
        if let Some(origin) = self.emulator_origin().as_deref() {
            return format!("{origin}/{project_id}/{}/{name}", self.region);
        }
        if let Some(domain) = &self.custom_domain {
            return format!("{domain}/{name}");
        }
        format!(
            "https://{}-{}.cloudfunctions.net/{}",
            self.region, project_id, name
        )
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::functions::error::FunctionsErrorCode;
    use crate::functions::stream::StreamEvent;
    use crate::functions::transport::CallableStreamResponse;
    use crate::platform::token::{AsyncTokenProvider, TokenError};
    use crate::test_support::{test_firebase_app, try_start_mock_server};
    use async_trait::async_trait;
    use futures::stream;
    use httpmock::Method::POST;

    struct ScriptedTransport {
        delay: Duration,
        response: CallableResponse,
        requests: Mutex<Vec<CallableRequest>>,
    }

    impl ScriptedTransport {
        fn new(delay: Duration, status: u16, body: Option<JsonValue>) -> Arc<Self> {
            Arc::new(Self {
                delay,
                response: CallableResponse { status, body },
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<CallableRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CallableTransport for ScriptedTransport {
        async fn invoke(&self, request: CallableRequest) -> CallableResponse {
            self.requests.lock().unwrap().push(request);
            sleep(self.delay).await;
            self.response.clone()
        }

        async fn invoke_stream(&self, request: CallableRequest) -> CallableStreamResponse {
            let response = self.invoke(request).await;
            let body = response
                .body
                .map(|body| body.to_string().into_bytes())
                .into_iter()
                .collect();
            CallableStreamResponse::from_chunks(response.status, body)
        }
    }

    /// Answers streaming calls with server-sent event text, one piece per `gap`.
    struct SseTransport {
        status: u16,
        gap: Duration,
        pieces: Vec<&'static str>,
        requests: Mutex<Vec<CallableRequest>>,
    }

    impl SseTransport {
        fn new(status: u16, gap: Duration, pieces: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                status,
                gap,
                pieces,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CallableTransport for SseTransport {
        async fn invoke(&self, _request: CallableRequest) -> CallableResponse {
            CallableResponse::default()
        }

        async fn invoke_stream(&self, request: CallableRequest) -> CallableStreamResponse {
            self.requests.lock().unwrap().push(request);
            let gap = self.gap;
            let pieces = self.pieces.clone();
            let body = stream::iter(pieces).then(move |piece| async move {
                sleep(gap).await;
                let chunk: FunctionsResult<Vec<u8>> = Ok(piece.as_bytes().to_vec());
                chunk
            });
            CallableStreamResponse::new(self.status, Box::pin(body))
        }
    }

    fn streaming(transport: Arc<SseTransport>, timeout_ms: u64) -> CallableFunction<JsonValue, i64> {
        Functions::builder(test_firebase_app("demo-project"))
            .with_transport(transport)
            .with_context_provider(
                ContextProvider::new().with_auth(Arc::new(StaticToken("auth-token"))),
            )
            .build()
            .unwrap()
            .https_callable(
                "count",
                HttpsCallableOptions {
                    timeout: Some(Duration::from_millis(timeout_ms)),
                    ..Default::default()
                },
            )
            .unwrap()
    }

    struct StaticToken(&'static str);

    #[async_trait]
    impl AsyncTokenProvider for StaticToken {
        async fn get_token(&self, _force_refresh: bool) -> Result<Option<String>, TokenError> {
            Ok(Some(self.0.to_string()))
        }
    }

    fn functions_with(transport: Arc<ScriptedTransport>) -> Functions {
        Functions::builder(test_firebase_app("demo-project"))
            .with_transport(transport)
            .build()
            .unwrap()
    }

    fn callable(functions: &Functions, timeout_ms: u64) -> CallableFunction<JsonValue, JsonValue> {
        functions
            .https_callable(
                "echo",
                HttpsCallableOptions {
                    timeout: Some(Duration::from_millis(timeout_ms)),
                    ..Default::default()
                },
            )
            .unwrap()
    }

    #[test]
    fn resolves_default_region_url() {
        let functions = functions_with(ScriptedTransport::new(Duration::ZERO, 200, None));
        assert_eq!(functions.region(), DEFAULT_REGION);
        assert_eq!(
            callable(&functions, 10).url().unwrap(),
            "https://us-central1-demo-project.cloudfunctions.net/echo"
        );
    }

    #[test]
    fn resolves_region_and_custom_domain() {
        let app = test_firebase_app("demo-project");
        let transport: Arc<dyn CallableTransport> =
            ScriptedTransport::new(Duration::ZERO, 200, None);

        let regional = Functions::builder(app.clone())
            .with_region_or_domain(Some("europe-west1"))
            .with_transport(transport.clone())
            .build()
            .unwrap();
        assert_eq!(
            regional
                .https_callable::<JsonValue, JsonValue>("/hello/", HttpsCallableOptions::default())
                .unwrap()
                .url()
                .unwrap(),
            "https://europe-west1-demo-project.cloudfunctions.net/hello"
        );

        let custom = Functions::builder(app)
            .with_region_or_domain(Some("https://mysite.com/api/"))
            .with_transport(transport)
            .build()
            .unwrap();
        assert_eq!(custom.region(), DEFAULT_REGION);
        assert_eq!(custom.custom_domain(), Some("https://mysite.com/api"));
        assert_eq!(
            callable(&custom, 10).url().unwrap(),
            "https://mysite.com/api/echo"
        );
    }

    #[test]
    fn emulator_overrides_every_other_endpoint() {
        let functions = Functions::builder(test_firebase_app("demo-project"))
            .with_region_or_domain(Some("https://mysite.com"))
            .with_transport(ScriptedTransport::new(Duration::ZERO, 200, None))
            .build()
            .unwrap();
        functions.connect_functions_emulator("localhost", 5001);
        assert_eq!(
            callable(&functions, 10).url().unwrap(),
            "http://localhost:5001/demo-project/us-central1/echo"
        );

        functions.connect_functions_emulator("abc.cloudworkstations.dev", 443);
        assert!(callable(&functions, 10)
            .url()
            .unwrap()
            .starts_with("https://abc.cloudworkstations.dev:443/"));
    }

    #[test]
    fn rejects_empty_names_and_bad_urls() {
        let functions = functions_with(ScriptedTransport::new(Duration::ZERO, 200, None));
        let err = functions
            .https_callable::<JsonValue, JsonValue>(" / ", HttpsCallableOptions::default())
            .unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::InvalidArgument);
        let err = functions
            .https_callable_from_url::<JsonValue, JsonValue>("not a url", HttpsCallableOptions::default())
            .unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::InvalidArgument);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sends_envelope_with_context_headers() {
        let transport = ScriptedTransport::new(
            Duration::ZERO,
            200,
            Some(json!({ "data": { "ok": true } })),
        );
        let functions = Functions::builder(test_firebase_app("demo-project"))
            .with_transport(transport.clone())
            .with_context_provider(
                ContextProvider::new()
                    .with_auth(Arc::new(StaticToken("auth-token")))
                    .with_messaging(Arc::new(StaticToken("iid-token"))),
            )
            .build()
            .unwrap();

        let response = callable(&functions, 1_000)
            .call_async(&json!({ "big": i64::MAX }))
            .await
            .unwrap();
        assert_eq!(response, json!({ "ok": true }));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.timeout, Duration::from_millis(1_000));
        assert_eq!(request.headers["Authorization"], "Bearer auth-token");
        assert_eq!(request.headers["Firebase-Instance-ID-Token"], "iid-token");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert!(!request.headers.contains_key("X-Firebase-AppCheck"));
        assert_eq!(
            request.payload,
            json!({ "data": { "big": {
                "@type": "type.googleapis.com/google.protobuf.Int64Value",
                "value": "9223372036854775807"
            } } })
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn accepts_result_alias_and_rejects_missing_data() {
        let functions = functions_with(ScriptedTransport::new(
            Duration::ZERO,
            200,
            Some(json!({ "result": [1, 2] })),
        ));
        let response = callable(&functions, 1_000).call_async(&json!(null)).await.unwrap();
        assert_eq!(response, json!([1, 2]));

        let functions = functions_with(ScriptedTransport::new(
            Duration::ZERO,
            200,
            Some(json!({ "other": 1 })),
        ));
        let err = callable(&functions, 1_000).call_async(&json!(null)).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
        assert_eq!(err.message(), "Response is missing data field.");

        let functions = functions_with(ScriptedTransport::new(Duration::ZERO, 200, None));
        let err = callable(&functions, 1_000).call_async(&json!(null)).await.unwrap_err();
        assert_eq!(err.message(), "Response is not valid JSON object.");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn null_data_is_a_successful_empty_result() {
        let functions = functions_with(ScriptedTransport::new(
            Duration::ZERO,
            200,
            Some(json!({ "data": null })),
        ));
        let response = callable(&functions, 1_000).call_async(&json!({})).await.unwrap();
        assert_eq!(response, JsonValue::Null);

        let unit: CallableFunction<JsonValue, ()> = functions
            .https_callable("noop", HttpsCallableOptions::default())
            .unwrap();
        unit.call_async(&json!({})).await.unwrap();

        let functions = functions_with(ScriptedTransport::new(
            Duration::ZERO,
            200,
            Some(json!({ "data": null, "result": 7 })),
        ));
        let response = callable(&functions, 1_000).call_async(&json!({})).await.unwrap();
        assert_eq!(response, JsonValue::Null);
    }

    #[test]
    fn callable_handles_are_debug() {
        let functions = functions_with(ScriptedTransport::new(Duration::ZERO, 200, None));
        let rendered = format!("{:?}", callable(&functions, 10));
        assert!(rendered.starts_with("CallableFunction"));
        assert!(rendered.contains("echo"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn maps_error_bodies_and_network_failures() {
        let functions = functions_with(ScriptedTransport::new(
            Duration::ZERO,
            400,
            Some(json!({ "error": { "status": "FAILED_PRECONDITION", "message": "nope" } })),
        ));
        let err = callable(&functions, 1_000).call_async(&json!({})).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::FailedPrecondition);
        assert_eq!(err.message(), "nope");

        let functions = functions_with(ScriptedTransport::new(Duration::ZERO, 0, None));
        let err = callable(&functions, 1_000).call_async(&json!({})).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn late_response_still_times_out() {
        let functions = functions_with(ScriptedTransport::new(
            Duration::from_millis(200),
            200,
            Some(json!({ "data": "late" })),
        ));
        let err = callable(&functions, 20).call_async(&json!({})).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::DeadlineExceeded);
        assert_eq!(err.message(), "deadline-exceeded");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn delete_cancels_in_flight_and_later_calls() {
        let functions = functions_with(ScriptedTransport::new(
            Duration::from_millis(200),
            200,
            Some(json!({ "data": "late" })),
        ));
        let pending = callable(&functions, 5_000);
        let deleter = functions.clone();
        let (result, ()) = futures::future::join(pending.call_async(&json!({})), async move {
            sleep(Duration::from_millis(20)).await;
            deleter.delete();
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Cancelled);
        assert_eq!(err.message(), "Firebase Functions instance was deleted.");

        let err = callable(&functions, 5_000).call_async(&json!({})).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Cancelled);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn calls_backend_over_http() {
        let Some(server) = try_start_mock_server("calls_backend_over_http") else {
            return;
        };
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/callable/hello")
                .header("authorization", "Bearer auth-token")
                .json_body(json!({ "data": { "message": "ping" } }));
            then.status(200)
                .json_body(json!({ "data": { "message": "pong" } }));
        });

        let functions = Functions::builder(test_firebase_app("demo-project"))
            .with_region_or_domain(Some(&server.url("/callable")))
            .with_context_provider(
                ContextProvider::new().with_auth(Arc::new(StaticToken("auth-token"))),
            )
            .build()
            .unwrap();
        let response: JsonValue = functions
            .https_callable::<JsonValue, JsonValue>("hello", HttpsCallableOptions::default())
            .unwrap()
            .call_async(&json!({ "message": "ping" }))
            .await
            .unwrap();

        assert_eq!(response, json!({ "message": "pong" }));
        mock.assert();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn streams_messages_then_result() {
        let transport = SseTransport::new(
            200,
            Duration::ZERO,
            vec![
                "data: {\"message\":\"st",
                "arted\"}\n\n: heartbeat\n",
                "data: {\"message\":{\"done\":1}}\n\n",
                "data: {\"result\":{\"@type\":\"type.googleapis.com/google.protobuf.Int64Value\",\"value\":\"9007199254740993\"}}\n\n",
            ],
        );
        let mut events = streaming(transport.clone(), 1_000)
            .stream::<JsonValue>(&json!({ "n": 2 }))
            .await
            .unwrap();

        assert_eq!(
            events.next().await,
            Some(Ok(StreamEvent::Chunk(json!("started"))))
        );
        assert_eq!(
            events.next().await,
            Some(Ok(StreamEvent::Chunk(json!({ "done": 1 }))))
        );
        assert_eq!(
            events.next().await,
            Some(Ok(StreamEvent::Result(9_007_199_254_740_993)))
        );
        assert_eq!(events.next().await, None);

        let requests = transport.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].headers["Accept"], "text/event-stream");
        assert_eq!(requests[0].headers["Authorization"], "Bearer auth-token");
        assert_eq!(requests[0].payload, json!({ "data": { "n": 2 } }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn stream_error_event_ends_the_stream() {
        let transport = SseTransport::new(
            200,
            Duration::ZERO,
            vec![
                "data: {\"message\":1}\n",
                "data: {\"error\":{\"status\":\"FAILED_PRECONDITION\",\"message\":\"nope\"}}\n",
                "data: {\"result\":2}\n",
            ],
        );
        let mut events = streaming(transport, 1_000)
            .stream::<i64>(&json!({}))
            .await
            .unwrap();
        assert_eq!(events.next().await, Some(Ok(StreamEvent::Chunk(1))));
        let err = events.next().await.unwrap().unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::FailedPrecondition);
        assert_eq!(err.message(), "nope");
        assert!(events.next().await.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn stream_rejects_error_statuses() {
        let transport = SseTransport::new(
            404,
            Duration::ZERO,
            vec!["{\"error\":{\"status\":\"NOT_FOUND\",\"message\":\"no such function\"}}"],
        );
        let err = streaming(transport, 1_000)
            .stream::<JsonValue>(&json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::NotFound);
        assert_eq!(err.message(), "no such function");

        let transport = SseTransport::new(0, Duration::ZERO, Vec::new());
        let err = streaming(transport, 1_000)
            .stream::<JsonValue>(&json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn quiet_stream_times_out() {
        let transport = SseTransport::new(
            200,
            Duration::from_millis(200),
            vec!["data: {\"result\":1}\n"],
        );
        let mut events = streaming(transport, 20)
            .stream::<JsonValue>(&json!({}))
            .await
            .unwrap();
        let err = events.next().await.unwrap().unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::DeadlineExceeded);
        assert!(events.next().await.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn delete_cancels_open_streams() {
        let transport = SseTransport::new(
            200,
            Duration::from_millis(200),
            vec!["data: {\"result\":1}\n"],
        );
        let function = streaming(transport, 5_000);
        let mut events = function.stream::<JsonValue>(&json!({})).await.unwrap();
        let functions = function.functions.clone();
        let (event, ()) = futures::future::join(events.next(), async move {
            sleep(Duration::from_millis(20)).await;
            functions.delete();
        })
        .await;
        let err = event.unwrap().unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Cancelled);
        assert_eq!(err.message(), "Firebase Functions instance was deleted.");

        let err = function.stream::<JsonValue>(&json!({})).await.unwrap_err();
        assert_eq!(err.code, FunctionsErrorCode::Cancelled);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn streams_over_http() {
        let Some(server) = try_start_mock_server("streams_over_http") else {
            return;
        };
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/callable/count")
                .header("accept", "text/event-stream")
                .json_body(json!({ "data": 2 }));
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("data: {\"message\":1}\n\ndata: {\"message\":2}\n\ndata: {\"result\":3}\n\n");
        });

        let functions = Functions::builder(test_firebase_app("demo-project"))
            .with_region_or_domain(Some(&server.url("/callable")))
            .build()
            .unwrap();
        let events: Vec<_> = functions
            .https_callable::<i64, i64>("count", HttpsCallableOptions::default())
            .unwrap()
            .stream::<i64>(&2)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                Ok(StreamEvent::Chunk(1)),
                Ok(StreamEvent::Chunk(2)),
                Ok(StreamEvent::Result(3)),
            ]
        );
        mock.assert();
    }
}
