use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

// tokio::time::sleep is only available on non-WASM targets.
#[cfg(not(target_arch = "wasm32"))]
use tokio::time::sleep;

use crate::{
    classify::{is_network_failure, is_transient_status},
    request_id::new_request_id,
    wire::{self, RefreshResponse, INVALID_JSON},
    ApiResponse, BearerTokenInterceptor, ClientOptions, ErrorKind, MemoryTokenStore,
    RequestInterceptor, RequestOptions, RequestParts, Result, StoredToken, TokenStore,
};

/// Header carrying the logical request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const TIMEOUT_MESSAGE: &str = "Request timeout";

type InterceptorSlot = Arc<RwLock<Option<Arc<dyn RequestInterceptor>>>>;

/// Resilient HTTP client for the planner API.
///
/// Every call resolves to an [`ApiResponse`] envelope: HTTP errors, timeouts
/// and network failures are reported through its `error` field, never as
/// `Err`. Retries, `Retry-After` handling and access-token refresh happen
/// transparently.
///
/// Clones share the connection pool, the token store and the interceptor slot.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    options: ClientOptions,
    token_store: Arc<dyn TokenStore>,
    bearer_auth: bool,
    interceptor: InterceptorSlot,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("options", &self.options)
            .field("bearer_auth", &self.bearer_auth)
            .field("interceptor", &self.current_interceptor().is_some())
            .finish_non_exhaustive()
    }
}

/// How the attempt loop for one logical request ended.
enum Settled {
    Response { status: u16, body: JsonValue },
    Failed {
        kind: ErrorKind,
        status: u16,
        message: String,
    },
}

struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

impl ApiClient {
    /// Creates a client with an in-memory token store and no interceptor.
    pub fn new(options: ClientOptions) -> Self {
        Self {
            http: build_http_client(),
            options,
            token_store: Arc::new(MemoryTokenStore::new()),
            bearer_auth: false,
            interceptor: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a client for `base_url` with otherwise default options.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use storyframe_client::ApiClient;
    ///
    /// let api = ApiClient::with_base_url("https://planner.example.com/api");
    /// ```
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::new(ClientOptions::default().with_base_url(base_url))
    }

    /// Creates a client from environment variables, see [`ClientOptions::from_env`].
    ///
    /// **Not available on `wasm32` targets.**
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> std::result::Result<Self, String> {
        ClientOptions::from_env().map(Self::new)
    }

    /// Applies client options such as base URL, timeout and retry behavior.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the store that receives refreshed access tokens.
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = store;
        self
    }

    /// Registers a request interceptor, see [`ApiClient::set_request_interceptor`].
    pub fn with_request_interceptor(self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.set_request_interceptor(interceptor);
        self
    }

    /// Sends the stored access token as `Authorization: Bearer <token>`.
    ///
    /// The token is read from whichever store the client holds when the
    /// request is sent, so this may be called before or after
    /// [`ApiClient::with_token_store`]. It runs ahead of the request
    /// interceptor, which can still override the header.
    pub fn with_bearer_auth(mut self) -> Self {
        self.bearer_auth = true;
        self
    }

    /// Installs the request interceptor, replacing any previous one.
    ///
    /// Affects every clone of this client, including requests already in
    /// flight from their next attempt on.
    pub fn set_request_interceptor(&self, interceptor: impl RequestInterceptor + 'static) {
        let interceptor: Arc<dyn RequestInterceptor> = Arc::new(interceptor);
        match self.interceptor.write() {
            Ok(mut slot) => *slot = Some(interceptor),
            Err(poisoned) => *poisoned.into_inner() = Some(interceptor),
        }
    }

    pub fn clear_request_interceptor(&self) {
        match self.interceptor.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.token_store
    }

    /// Sends a `GET` request.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<ApiResponse<T>> {
        self.get_with(endpoint, RequestOptions::default()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>> {
        self.request(endpoint, with_method(options, Method::GET))
            .await
    }

    /// Sends a `POST` request with `data` as JSON body.
    ///
    /// # Errors
    ///
    /// Only [`ApiError::Serialize`](crate::ApiError::Serialize) and
    /// [`ApiError::Interceptor`](crate::ApiError::Interceptor); HTTP failures
    /// are reported in the envelope.
    pub async fn post<T, B>(&self, endpoint: &str, data: &B) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.post_with(endpoint, data, RequestOptions::default())
            .await
    }

    pub async fn post_with<T, B>(
        &self,
        endpoint: &str,
        data: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let options = with_method(options, Method::POST).json(data)?;
        self.request(endpoint, options).await
    }

    /// Sends a `PUT` request with `data` as JSON body.
    pub async fn put<T, B>(&self, endpoint: &str, data: &B) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.put_with(endpoint, data, RequestOptions::default())
            .await
    }

    pub async fn put_with<T, B>(
        &self,
        endpoint: &str,
        data: &B,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let options = with_method(options, Method::PUT).json(data)?;
        self.request(endpoint, options).await
    }

    /// Sends a `DELETE` request.
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<ApiResponse<T>> {
        self.delete_with(endpoint, RequestOptions::default())
            .await
    }

    pub async fn delete_with<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>> {
        self.request(endpoint, with_method(options, Method::DELETE))
            .await
    }

    /// Performs one logical request with the configured retry budget.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>> {
        self.request_with_retries(endpoint, options, self.options.retry_attempts)
            .await
    }

    /// Performs one logical request allowing `retries_remaining` retries.
    ///
    /// A final `401` triggers one refresh-and-replay: the refresh endpoint is
    /// called once, and on success the request is replayed once without
    /// retries. The replay's envelope is returned.
    pub async fn request_with_retries<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
        retries_remaining: u32,
    ) -> Result<ApiResponse<T>> {
        let request_id = new_request_id();
        let settled = self
            .settle(endpoint, &options, &request_id, retries_remaining)
            .await?;

        if self.should_refresh(endpoint, &settled) && self.refresh_access_token(&request_id).await
        {
            let replay = self.settle(endpoint, &options, &request_id, 0).await?;
            return Ok(into_envelope(replay, &request_id));
        }

        Ok(into_envelope(settled, &request_id))
    }

    /// Runs physical attempts until a non-retryable outcome or the retry
    /// budget is spent.
    async fn settle(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        request_id: &str,
        mut retries_remaining: u32,
    ) -> Result<Settled> {
        loop {
            let response = match self.dispatch(endpoint, options, request_id).await? {
                Ok(response) => response,
                Err(err) => {
                    let kind = ErrorKind::from_transport(&err);
                    if kind == ErrorKind::Timeout {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(request_id, endpoint, "request timed out");
                        return Ok(Settled::Failed {
                            kind,
                            status: StatusCode::REQUEST_TIMEOUT.as_u16(),
                            message: TIMEOUT_MESSAGE.to_owned(),
                        });
                    }
                    if retries_remaining > 0 && is_network_failure(&err) {
                        let delay = self.linear_backoff(retries_remaining);
                        self.wait_before_retry(delay, request_id, "network failure")
                            .await;
                        retries_remaining -= 1;
                        continue;
                    }
                    return Ok(Settled::Failed {
                        kind,
                        status: 0,
                        message: err.to_string(),
                    });
                }
            };

            let status = response.status.as_u16();
            if retries_remaining > 0 {
                let delay = match ErrorKind::from_status(status) {
                    Some(ErrorKind::RateLimited) => Some(self.rate_limit_backoff(&response.headers)),
                    Some(_) if is_transient_status(status) => {
                        Some(self.linear_backoff(retries_remaining))
                    }
                    _ => None,
                };
                if let Some(delay) = delay {
                    self.wait_before_retry(delay, request_id, "retryable status")
                        .await;
                    retries_remaining -= 1;
                    continue;
                }
            }

            let body = wire::parse_body(&response.headers, &response.body);
            return Ok(Settled::Response { status, body });
        }
    }

    /// Sends one physical attempt and reads the full body.
    ///
    /// The outer `Result` carries interceptor failures, the inner one
    /// transport failures.
    async fn dispatch(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        request_id: &str,
    ) -> Result<std::result::Result<RawResponse, reqwest::Error>> {
        let mut parts = self.prepare(endpoint, options, request_id);
        if self.bearer_auth {
            parts = BearerTokenInterceptor::new(Arc::clone(&self.token_store))
                .intercept(parts)
                .await?;
        }
        if let Some(interceptor) = self.current_interceptor() {
            parts = interceptor.intercept(parts).await?;
        }

        let mut builder = self
            .http
            .request(parts.method, parts.url)
            .headers(parts.headers)
            .timeout(self.timeout());
        if let Some(body) = parts.body {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return Ok(Err(err)),
        };
        let status = response.status();
        let headers = response.headers().clone();
        Ok(response.bytes().await.map(|body| RawResponse {
            status,
            headers,
            body: body.to_vec(),
        }))
    }

    fn prepare(&self, endpoint: &str, options: &RequestOptions, request_id: &str) -> RequestParts {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
        headers.extend(options.headers.clone());

        RequestParts {
            method: options.method.clone(),
            url: self.url_for(endpoint),
            headers,
            body: options.body.clone(),
            request_id: request_id.to_owned(),
        }
    }

    fn should_refresh(&self, endpoint: &str, settled: &Settled) -> bool {
        matches!(settled, Settled::Response { status: 401, .. })
            && !same_endpoint(endpoint, &self.options.refresh_endpoint)
    }

    /// Exchanges the session credentials for a new access token.
    ///
    /// Returns `true` when a token was obtained. Failures are logged, never
    /// propagated: the caller falls back to the original `401` envelope.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    async fn refresh_access_token(&self, request_id: &str) -> bool {
        let builder = self
            .http
            .post(self.url_for(&self.options.refresh_endpoint))
            .header(header::CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, request_id)
            .timeout(self.timeout());
        // Native clients keep session cookies in the client's cookie store.
        #[cfg(target_arch = "wasm32")]
        let builder = builder.fetch_credentials_include();

        let response = match builder.send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(request_id, status = response.status().as_u16(), "token refresh rejected");
                return false;
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(request_id, error = %err, "token refresh failed");
                return false;
            }
        };

        let payload = match response.json::<RefreshResponse>().await {
            Ok(payload) => payload,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(request_id, error = %err, "token refresh returned an unusable body");
                return false;
            }
        };

        let ttl_ms = u64::try_from(payload.ttl().as_millis()).unwrap_or(u64::MAX);
        let token = StoredToken::expiring_in(payload.access_token, ttl_ms);
        if let Err(err) = self.token_store.set(token) {
            #[cfg(feature = "tracing")]
            tracing::warn!(request_id, error = %err, "could not persist refreshed token");
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(request_id, "access token refreshed, replaying request");
        true
    }

    fn current_interceptor(&self) -> Option<Arc<dyn RequestInterceptor>> {
        match self.interceptor.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.options.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.options.timeout_ms)
    }

    /// `retry_delay * attempt`, where `attempt` counts from 1 for the first
    /// retry of the configured budget.
    fn linear_backoff(&self, retries_remaining: u32) -> Duration {
        let attempt = self.options.retry_attempts.saturating_sub(retries_remaining) + 1;
        Duration::from_millis(
            self.options
                .retry_delay_ms
                .saturating_mul(u64::from(attempt)),
        )
    }

    /// `Retry-After` when the server sent one, else twice the base delay.
    fn rate_limit_backoff(&self, headers: &HeaderMap) -> Duration {
        wire::retry_after(headers)
            .unwrap_or_else(|| Duration::from_millis(self.options.retry_delay_ms.saturating_mul(2)))
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    async fn wait_before_retry(&self, delay: Duration, request_id: &str, reason: &str) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            request_id,
            reason,
            delay_ms = delay.as_millis() as u64,
            "retrying request"
        );

        sleep(delay).await;
    }
}

fn with_method(options: RequestOptions, method: Method) -> RequestOptions {
    RequestOptions { method, ..options }
}

fn same_endpoint(left: &str, right: &str) -> bool {
    let normalize = |path: &str| path.trim_matches('/').to_owned();
    normalize(left) == normalize(right)
}

fn into_envelope<T: DeserializeOwned>(settled: Settled, request_id: &str) -> ApiResponse<T> {
    match settled {
        Settled::Failed {
            kind,
            status,
            message,
        } => ApiResponse::failure(message, status, kind, request_id),
        Settled::Response { status, body } => match ErrorKind::from_status(status) {
            Some(kind) => {
                ApiResponse::failure(wire::error_message(&body, status), status, kind, request_id)
            }
            None => match serde_json::from_value::<T>(body) {
                Ok(data) => ApiResponse::success(data, status, request_id),
                Err(err) => ApiResponse::failure(
                    format!("{INVALID_JSON}: {err}"),
                    status,
                    ErrorKind::ClientError,
                    request_id,
                ),
            },
        },
    }
}

fn build_http_client() -> reqwest::Client {
    #[cfg(not(target_arch = "wasm32"))]
    {
        reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }
    #[cfg(target_arch = "wasm32")]
    {
        reqwest::Client::new()
    }
}

/// Sleeps through the host's `setTimeout`; resolves immediately when the host
/// has none.
#[cfg(target_arch = "wasm32")]
async fn sleep(delay: Duration) {
    use wasm_bindgen::{JsCast, JsValue};

    let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("setTimeout"))
            .ok()
            .and_then(|set_timeout| set_timeout.dyn_into::<js_sys::Function>().ok())
            .map(|set_timeout| set_timeout.call2(&JsValue::NULL, &resolve, &JsValue::from(millis)));
        if !matches!(scheduled, Some(Ok(_))) {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}
