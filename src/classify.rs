//! Per-attempt outcome classification.
//!
//! Every physical attempt is classified once; the retry loop in
//! [`ApiClient`](crate::ApiClient) branches on the result instead of
//! inspecting status codes or error messages ad hoc.

use serde::Serialize;

/// Closed set of failure kinds an attempt can end in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection, DNS or other transport-level failure (status `0`).
    Transport,
    /// The per-attempt timeout elapsed (status `408`).
    Timeout,
    /// Server answered `429 Too Many Requests`.
    RateLimited,
    /// `5xx`, or `408` sent by the server itself.
    ServerError,
    /// Any other non-success status.
    ClientError,
    /// Server answered `401 Unauthorized`.
    Unauthorized,
}

impl ErrorKind {
    /// Classifies an HTTP status. Returns `None` for `2xx`.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(Self::Unauthorized),
            429 => Some(Self::RateLimited),
            408 | 500..=599 => Some(Self::ServerError),
            _ => Some(Self::ClientError),
        }
    }

    /// Classifies a transport error raised while sending or reading a response.
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport
        }
    }
}

/// Statuses worth another attempt after a linear backoff.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Whether a transport error came from the network rather than from building
/// the request (bad URL, invalid header), which would fail identically again.
pub(crate) fn is_network_failure(err: &reqwest::Error) -> bool {
    err.is_request()
        || err.is_body()
        // is_connect() is not available on wasm32 targets (no TCP)
        || {
            #[cfg(not(target_arch = "wasm32"))]
            { err.is_connect() }
            #[cfg(target_arch = "wasm32")]
            { false }
        }
}

#[cfg(test)]
mod tests {
    use super::{is_transient_status, ErrorKind};

    #[test]
    fn success_statuses_are_not_classified() {
        assert_eq!(ErrorKind::from_status(200), None);
        assert_eq!(ErrorKind::from_status(204), None);
    }

    #[test]
    fn status_classification() {
        assert_eq!(ErrorKind::from_status(401), Some(ErrorKind::Unauthorized));
        assert_eq!(ErrorKind::from_status(429), Some(ErrorKind::RateLimited));
        assert_eq!(ErrorKind::from_status(408), Some(ErrorKind::ServerError));
        assert_eq!(ErrorKind::from_status(503), Some(ErrorKind::ServerError));
        assert_eq!(ErrorKind::from_status(501), Some(ErrorKind::ServerError));
        assert_eq!(ErrorKind::from_status(404), Some(ErrorKind::ClientError));
        assert_eq!(ErrorKind::from_status(403), Some(ErrorKind::ClientError));
    }

    #[test]
    fn transient_set_is_exact() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(is_transient_status(status), "{status} should retry");
        }
        for status in [400, 401, 403, 404, 409, 501, 505] {
            assert!(!is_transient_status(status), "{status} should not retry");
        }
    }
}
