use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

pub(crate) const INVALID_JSON: &str = "Invalid JSON response";

/// Access token lifetime assumed when the refresh payload omits `expiresIn`.
pub(crate) const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Successful refresh endpoint payload.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "access_token")]
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default, rename = "expiresIn", alias = "expires_in")]
    pub expires_in: Option<u64>,
}

impl RefreshResponse {
    pub fn ttl(&self) -> Duration {
        self.expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL)
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
}

/// Parses a response body according to its `content-type`.
///
/// JSON bodies that fail to parse become `{"error": "Invalid JSON response"}`;
/// anything else is returned as a JSON string. Empty bodies are `null`.
pub(crate) fn parse_body(headers: &HeaderMap, body: &[u8]) -> JsonValue {
    if body.iter().all(u8::is_ascii_whitespace) {
        return JsonValue::Null;
    }
    if is_json(headers) {
        serde_json::from_slice(body).unwrap_or_else(|_| json!({ "error": INVALID_JSON }))
    } else {
        JsonValue::String(String::from_utf8_lossy(body).into_owned())
    }
}

/// Picks the server-provided error message, or a generic one.
pub(crate) fn error_message(body: &JsonValue, status: u16) -> String {
    ["error", "message"]
        .iter()
        .find_map(|key| body.get(key).and_then(JsonValue::as_str))
        .filter(|message| !message.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Request failed with status {status}"))
}

/// `Retry-After` in delta-seconds. HTTP-date values are not supported.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
    use serde_json::json;

    use super::{error_message, parse_body, retry_after, RefreshResponse, DEFAULT_TOKEN_TTL};

    fn headers(name: reqwest::header::HeaderName, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn json_body_is_parsed() {
        let headers = headers(CONTENT_TYPE, "application/json; charset=utf-8");
        assert_eq!(
            parse_body(&headers, br#"{"adaptedContent":"HI"}"#),
            json!({"adaptedContent": "HI"})
        );
    }

    #[test]
    fn malformed_json_is_substituted() {
        let headers = headers(CONTENT_TYPE, "application/json");
        assert_eq!(
            parse_body(&headers, b"<html>oops"),
            json!({"error": "Invalid JSON response"})
        );
    }

    #[test]
    fn non_json_body_is_text() {
        let headers = headers(CONTENT_TYPE, "text/plain");
        assert_eq!(parse_body(&headers, b"pong"), json!("pong"));
        assert_eq!(parse_body(&HeaderMap::new(), b"{\"a\":1}"), json!("{\"a\":1}"));
    }

    #[test]
    fn empty_body_is_null() {
        let headers = headers(CONTENT_TYPE, "application/json");
        assert_eq!(parse_body(&headers, b""), serde_json::Value::Null);
        assert_eq!(parse_body(&HeaderMap::new(), b"  \n"), serde_json::Value::Null);
    }

    #[test]
    fn error_message_prefers_error_then_message() {
        assert_eq!(error_message(&json!({"error": "boom"}), 500), "boom");
        assert_eq!(error_message(&json!({"message": "nope"}), 403), "nope");
        assert_eq!(
            error_message(&json!("plain text"), 404),
            "Request failed with status 404"
        );
        assert_eq!(
            error_message(&json!({"error": {"code": 1}}), 400),
            "Request failed with status 400"
        );
    }

    #[test]
    fn retry_after_reads_delta_seconds() {
        assert_eq!(
            retry_after(&headers(RETRY_AFTER, "2")),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            retry_after(&headers(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT")),
            None
        );
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn refresh_payload_accepts_both_casings() {
        let camel: RefreshResponse =
            serde_json::from_value(json!({"accessToken": "a", "expiresIn": 60})).expect("camel");
        assert_eq!(camel.access_token, "a");
        assert_eq!(camel.ttl(), Duration::from_secs(60));

        let snake: RefreshResponse =
            serde_json::from_value(json!({"access_token": "b"})).expect("snake");
        assert_eq!(snake.access_token, "b");
        assert_eq!(snake.ttl(), DEFAULT_TOKEN_TTL);
    }
}
