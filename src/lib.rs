//! `storyframe-client` is a resilient async HTTP client for the Storyframe
//! script planner API.
//!
//! Every call returns an [`ApiResponse`] envelope instead of failing on HTTP
//! or network errors. Behind [`ApiClient::request`] the client handles:
//! - per-attempt timeouts (status `408`)
//! - linear-backoff retries for transient statuses and network failures
//! - `429` retries honoring `Retry-After`
//! - one-shot access-token refresh and replay on `401`
//!
//! Convenience wrappers: [`ApiClient::get`], [`ApiClient::post`],
//! [`ApiClient::put`], [`ApiClient::delete`].

mod classify;
mod client;
mod error;
mod interceptor;
mod options;
mod request_id;
mod token_store;
mod types;
mod wire;

pub use classify::{is_transient_status, ErrorKind};
pub use client::{ApiClient, REQUEST_ID_HEADER};
pub use error::{ApiError, TokenStoreError};
pub use interceptor::{BearerTokenInterceptor, RequestInterceptor};
pub use options::{ClientOptions, RuntimeMode};
pub use request_id::new_request_id;
#[cfg(not(target_arch = "wasm32"))]
pub use token_store::FileTokenStore;
pub use token_store::{MemoryTokenStore, StoredToken, TokenStore};
pub use types::{ApiResponse, RequestOptions, RequestParts};

/// Re-exported so callers can build headers and methods without a direct
/// `reqwest` dependency.
pub use reqwest::{header, Method};

pub type Result<T> = std::result::Result<T, ApiError>;
