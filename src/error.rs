/// Error type returned by this crate.
///
/// HTTP and network failures never surface here; they come back as
/// [`ApiResponse`](crate::ApiResponse) envelopes. `ApiError` is reserved for
/// caller defects and for explicit envelope unwrapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request body could not be serialized to JSON.
    #[error("failed to serialize request body: {0}")]
    Serialize(serde_json::Error),
    /// The registered request interceptor rejected the request.
    #[error("request interceptor failed: {0}")]
    Interceptor(String),
    /// Error envelope converted with [`ApiResponse::into_data`](crate::ApiResponse::into_data).
    #[error("request {request_id} failed with status {status}: {message}")]
    Http {
        status: u16,
        message: String,
        request_id: String,
    },
}

impl ApiError {
    /// Builds an interceptor failure from any displayable cause.
    pub fn interceptor(cause: impl std::fmt::Display) -> Self {
        Self::Interceptor(cause.to_string())
    }
}

/// Error returned by [`TokenStore`](crate::TokenStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("token storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("token storage lock poisoned")]
    Poisoned,
}
