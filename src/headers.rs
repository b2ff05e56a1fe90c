//! Caller-supplied agent headers.
//!
//! A caller may attach `X-A2A-Agent-Headers: {"k": "v", ...}` to any call;
//! the bundle travels with the call in a [`CallContext`] and each adapter
//! forwards it to the agent (gRPC metadata or HTTP headers).

use std::collections::BTreeMap;

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

/// Name of the inbound header carrying the bundle.
pub const AGENT_HEADERS_HEADER: &str = "x-a2a-agent-headers";

/// Headers to forward to the agent, sorted by key.
pub type HeaderBundle = BTreeMap<String, String>;

/// Parses the agent header bundle from inbound HTTP headers.
///
/// Returns `None` if the header is absent, not UTF-8, or not a JSON object
/// of string values. None of these are errors.
pub fn extract_agent_headers(headers: &HeaderMap) -> Option<HeaderBundle> {
    let raw = headers.get(AGENT_HEADERS_HEADER)?;
    let raw = match raw.to_str() {
        Ok(raw) => raw,
        Err(_) => {
            tracing::debug!("ignoring non-UTF-8 agent headers");
            return None;
        }
    };
    match serde_json::from_str::<HeaderBundle>(raw) {
        Ok(bundle) => Some(bundle),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed agent headers");
            None
        }
    }
}

/// Per-call state handed to every [`crate::A2AService`] operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    agent_headers: Option<HeaderBundle>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a context carrying `headers`. `None` leaves the context as it
    /// is, so attaching the same bundle twice yields the same context.
    pub fn with_agent_headers(mut self, headers: Option<HeaderBundle>) -> Self {
        if headers.is_some() {
            self.agent_headers = headers;
        }
        self
    }

    /// The bundle to forward, if any.
    pub fn agent_headers(&self) -> Option<&HeaderBundle> {
        self.agent_headers.as_ref()
    }
}

/// Axum middleware: builds the [`CallContext`] for each request and stores it
/// in the request extensions.
pub async fn agent_headers_layer(mut request: Request, next: Next) -> Response {
    let headers = extract_agent_headers(request.headers());
    let ctx = CallContext::new().with_agent_headers(headers);
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AGENT_HEADERS_HEADER,
            HeaderValue::from_bytes(value).unwrap(),
        );
        headers
    }

    #[test]
    fn parses_json_object() {
        let bundle = extract_agent_headers(&headers_with(br#"{"tenant":"acme","x-trace":"1"}"#))
            .expect("bundle");
        assert_eq!(bundle.get("tenant").map(String::as_str), Some("acme"));
        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn header_name_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-A2A-Agent-Headers",
            HeaderValue::from_static(r#"{"a":"b"}"#),
        );
        assert!(extract_agent_headers(&headers).is_some());
    }

    #[test]
    fn absent_or_malformed_yields_none() {
        assert!(extract_agent_headers(&HeaderMap::new()).is_none());
        assert!(extract_agent_headers(&headers_with(b"not json")).is_none());
        assert!(extract_agent_headers(&headers_with(br#"{"n": 1}"#)).is_none());
        assert!(extract_agent_headers(&headers_with(br#"["a"]"#)).is_none());
        assert!(extract_agent_headers(&headers_with(b"{\"a\":\"\xff\"}")).is_none());
    }

    #[test]
    fn attaching_is_idempotent() {
        let bundle: HeaderBundle = [("tenant".to_string(), "acme".to_string())].into();
        let once = CallContext::new().with_agent_headers(Some(bundle.clone()));
        let twice = once.clone().with_agent_headers(Some(bundle));
        assert_eq!(once, twice);
        assert_eq!(twice.clone().with_agent_headers(None), twice);
    }
}
