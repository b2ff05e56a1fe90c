//! HTTP transport for the JSON-RPC dialect.
//!
//! Provides the `Transport` trait for abstracting over how JSON-RPC requests
//! reach the agent, and `JsonRpcTransport`, the standard JSON-RPC over HTTP
//! binding built on `reqwest`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::TransportConfig;

use super::error::{A2AError, A2AResult};
use super::sse::SseStream;
use super::types::{JsonRpcRequest, JsonRpcResponse};

/// Per-call metadata, sent as HTTP request headers.
///
/// Interceptors append to it before every outbound call. Keys may repeat;
/// every entry is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallMeta {
    entries: Vec<(String, String)>,
}

impl CallMeta {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts the entries to HTTP headers. Entries that are not valid
    /// header names or values are skipped.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (key, value) in self.iter() {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(val)) => {
                    headers.append(name, val);
                }
                _ => tracing::warn!(header = %key, "skipping invalid outbound header"),
            }
        }
        headers
    }
}

/// Transport abstraction for JSON-RPC calls.
///
/// Implementations handle the low-level details of sending JSON-RPC requests
/// and receiving responses (or SSE streams) over a particular binding.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a JSON-RPC request and receive a JSON-RPC response.
    async fn send(&self, request: &JsonRpcRequest, meta: &CallMeta) -> A2AResult<JsonRpcResponse>;

    /// Send a JSON-RPC request and receive an SSE event stream.
    ///
    /// Used for `message/stream` and `tasks/resubscribe`.
    async fn send_stream(&self, request: &JsonRpcRequest, meta: &CallMeta)
        -> A2AResult<SseStream>;
}

/// JSON-RPC over HTTP transport using `reqwest`.
///
/// Sends POST requests with `Content-Type: application/json` and parses the
/// response as a JSON-RPC result or error. For streaming methods the
/// response body is read as an SSE event stream.
#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    client: reqwest::Client,
    url: String,
    request_timeout: std::time::Duration,
}

impl JsonRpcTransport {
    /// Create a transport targeting the given endpoint URL.
    ///
    /// The connect timeout and static headers are fixed on the underlying
    /// client. The request timeout only bounds unary calls; streams stay
    /// open for as long as the agent keeps sending.
    pub fn with_config(url: impl Into<String>, config: &TransportConfig) -> A2AResult<Self> {
        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                default_headers.insert(name, val);
            }
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| A2AError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            request_timeout: config.request_timeout,
        })
    }

    /// Returns the URL this transport sends requests to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The shared HTTP client, reused for agent card discovery.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    fn post(&self, request: &JsonRpcRequest, meta: &CallMeta) -> A2AResult<reqwest::RequestBuilder> {
        let body = serde_json::to_vec(request).map_err(|e| {
            A2AError::Transport(format!("failed to serialize JSON-RPC request: {e}"))
        })?;

        Ok(self
            .client
            .post(&self.url)
            .headers(meta.to_header_map())
            .header("Content-Type", "application/json")
            .body(body))
    }
}

fn send_error(e: reqwest::Error, what: &str) -> A2AError {
    if e.is_timeout() {
        A2AError::Timeout(format!("{what} timed out: {e}"))
    } else if e.is_connect() {
        A2AError::Transport(format!("{what} connection failed: {e}"))
    } else {
        A2AError::Transport(format!("{what} failed: {e}"))
    }
}

async fn check_status(response: reqwest::Response) -> A2AResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(A2AError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Transport for JsonRpcTransport {
    async fn send(&self, request: &JsonRpcRequest, meta: &CallMeta) -> A2AResult<JsonRpcResponse> {
        tracing::debug!(method = %request.method, url = %self.url, "sending JSON-RPC request");

        let response = self
            .post(request, meta)?
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| send_error(e, "request"))?;
        let response = check_status(response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read response body: {e}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| A2AError::InvalidJson(format!("failed to parse JSON-RPC response: {e}")))
    }

    async fn send_stream(
        &self,
        request: &JsonRpcRequest,
        meta: &CallMeta,
    ) -> A2AResult<SseStream> {
        tracing::debug!(method = %request.method, url = %self.url, "opening JSON-RPC stream");

        let response = self
            .post(request, meta)?
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| send_error(e, "stream request"))?;
        let response = check_status(response).await?;

        // Agents reject a stream request with a plain JSON-RPC error body.
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if is_json {
            let body = response
                .bytes()
                .await
                .map_err(|e| A2AError::Transport(format!("failed to read response body: {e}")))?;
            let rpc: JsonRpcResponse = serde_json::from_slice(&body).map_err(|e| {
                A2AError::InvalidJson(format!("failed to parse JSON-RPC response: {e}"))
            })?;
            return Err(match rpc.error {
                Some(error) => error.into(),
                None => A2AError::InvalidJson("expected an event stream, got a JSON result".into()),
            });
        }

        Ok(SseStream::from_response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_meta_keeps_repeated_keys() {
        let mut meta = CallMeta::new();
        meta.append("x-tenant", "acme");
        meta.append("x-tenant", "globex");
        let headers = meta.to_header_map();
        let values: Vec<_> = headers.get_all("x-tenant").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn call_meta_skips_invalid_header_names() {
        let mut meta = CallMeta::new();
        meta.append("bad header", "v");
        meta.append("good", "v");
        let headers = meta.to_header_map();
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("good"));
    }
}
