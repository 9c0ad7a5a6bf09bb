use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};

use crate::{ApiError, RequestParts, Result, TokenStore};

/// Hook run once per physical attempt, before the request is dispatched.
///
/// Typical use is header injection (bearer tokens, tracing headers) without
/// the client knowing the auth scheme. Returning an error aborts the logical
/// request with [`ApiError::Interceptor`].
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, request: RequestParts) -> Result<RequestParts>;
}

#[async_trait]
impl<F> RequestInterceptor for F
where
    F: Fn(RequestParts) -> RequestParts + Send + Sync,
{
    async fn intercept(&self, request: RequestParts) -> Result<RequestParts> {
        Ok(self(request))
    }
}

/// Adds `Authorization: Bearer <token>` from a [`TokenStore`].
///
/// Expired or missing tokens are skipped, as are requests that already carry
/// an `Authorization` header.
pub struct BearerTokenInterceptor {
    store: Arc<dyn TokenStore>,
}

impl BearerTokenInterceptor {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RequestInterceptor for BearerTokenInterceptor {
    async fn intercept(&self, mut request: RequestParts) -> Result<RequestParts> {
        if request.headers.contains_key(AUTHORIZATION) {
            return Ok(request);
        }

        let token = self.store.get().map_err(ApiError::interceptor)?;
        if let Some(token) = token.filter(|token| !token.is_expired()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
                .map_err(ApiError::interceptor)?;
            request.headers.insert(AUTHORIZATION, value);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::{
        header::{HeaderMap, HeaderValue, AUTHORIZATION},
        Method,
    };

    use super::{BearerTokenInterceptor, RequestInterceptor};
    use crate::{MemoryTokenStore, RequestParts, StoredToken, TokenStore};

    fn parts() -> RequestParts {
        RequestParts {
            method: Method::GET,
            url: "http://localhost/api/projects".to_owned(),
            headers: HeaderMap::new(),
            body: None,
            request_id: "1-abc".to_owned(),
        }
    }

    #[tokio::test]
    async fn closure_interceptor_edits_headers() {
        let interceptor = |mut parts: RequestParts| {
            parts
                .headers
                .insert("x-client", HeaderValue::from_static("planner"));
            parts
        };
        let parts = interceptor.intercept(parts()).await.expect("intercept");
        assert_eq!(parts.headers["x-client"], "planner");
    }

    #[tokio::test]
    async fn bearer_interceptor_injects_valid_token() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .set(StoredToken::expiring_in("fresh", 60_000))
            .expect("set");
        let interceptor = BearerTokenInterceptor::new(store);

        let parts = interceptor.intercept(parts()).await.expect("intercept");
        assert_eq!(parts.headers[AUTHORIZATION], "Bearer fresh");
    }

    #[tokio::test]
    async fn bearer_interceptor_skips_expired_token() {
        let store = Arc::new(MemoryTokenStore::new());
        store.set(StoredToken::new("stale", 1)).expect("set");
        let interceptor = BearerTokenInterceptor::new(store);

        let parts = interceptor.intercept(parts()).await.expect("intercept");
        assert!(!parts.headers.contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn bearer_interceptor_keeps_explicit_authorization() {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .set(StoredToken::expiring_in("fresh", 60_000))
            .expect("set");
        let interceptor = BearerTokenInterceptor::new(store);

        let mut request = parts();
        request
            .headers
            .insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let parts = interceptor.intercept(request).await.expect("intercept");
        assert_eq!(parts.headers[AUTHORIZATION], "Basic abc");
    }
}
