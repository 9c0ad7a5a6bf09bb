use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::Serialize;

use crate::{ApiError, ErrorKind, Result};

/// Uniform result of one logical request.
///
/// Exactly one of `data` and `error` is set.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP status, `0` for transport failure, `408` for client-side timeout.
    pub status: u16,
    /// Logical request id, shared by every attempt of the request.
    pub request_id: String,
    /// Failure classification, `None` on success.
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
}

impl<T> ApiResponse<T> {
    pub(crate) fn success(data: T, status: u16, request_id: &str) -> Self {
        Self {
            data: Some(data),
            error: None,
            status,
            request_id: request_id.to_owned(),
            kind: None,
        }
    }

    pub(crate) fn failure(
        message: impl Into<String>,
        status: u16,
        kind: ErrorKind,
        request_id: &str,
    ) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
            status,
            request_id: request_id.to_owned(),
            kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Converts the envelope into its payload, turning an error envelope into
    /// [`ApiError::Http`].
    pub fn into_data(self) -> Result<T> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, error) => Err(ApiError::Http {
                status: self.status,
                message: error.unwrap_or_else(|| format!("Request failed with status {}", self.status)),
                request_id: self.request_id,
            }),
        }
    }
}

/// Caller-supplied shape of a request: method, extra headers and JSON body.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serializes `body` as the JSON request payload.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(ApiError::Serialize)?;
        self.body = Some(bytes);
        Ok(self)
    }
}

/// One physical attempt as handed to the request interceptor.
#[derive(Clone, Debug)]
pub struct RequestParts {
    pub method: Method,
    /// Absolute URL: base URL joined with the endpoint.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Logical request id, also present in the `X-Request-ID` header.
    pub request_id: String,
}
