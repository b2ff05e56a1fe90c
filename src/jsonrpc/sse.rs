//! Server-Sent Events decoding for JSON-RPC streaming responses.
//!
//! Collects the `data:` lines of each SSE event from the HTTP body and
//! deserializes them into [`StreamResponse`] events. Decoding is pull-based: the body is only read
//! when the consumer asks for the next event, and dropping the stream drops
//! the body.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};

use super::error::{A2AError, A2AResult};
use super::types::StreamResponse;

/// A stream of A2A server-sent events.
///
/// Yields `Err(A2AError::EndOfStream)` once if the agent sends the `[DONE]`
/// sentinel, then ends. A body that simply closes ends without it.
pub struct SseStream {
    inner: BoxStream<'static, A2AResult<StreamResponse>>,
}

impl std::fmt::Debug for SseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseStream").finish_non_exhaustive()
    }
}

impl SseStream {
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        Self::from_body(response.bytes_stream())
    }

    /// Decode an arbitrary byte stream.
    pub fn from_body<S, E>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        Self {
            inner: decode_events(body).boxed(),
        }
    }

    /// Get the next event from the stream.
    pub async fn next(&mut self) -> Option<A2AResult<StreamResponse>> {
        self.inner.next().await
    }
}

impl Stream for SseStream {
    type Item = A2AResult<StreamResponse>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Longest line or event payload accepted from an agent.
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

enum Frame {
    Event(StreamResponse),
    Done,
}

fn decode_events<S, E>(body: S) -> impl Stream<Item = A2AResult<StreamResponse>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        futures::pin_mut!(body);
        let mut buffer: Vec<u8> = Vec::new();
        let mut pending = EventData::default();

        loop {
            while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                let frame = match pending.push_line(&line) {
                    Ok(Some(data)) => parse_event(&data),
                    Ok(None) => Ok(None),
                    Err(e) => Err(e),
                };
                match frame {
                    Ok(None) => {}
                    Ok(Some(Frame::Event(event))) => yield Ok(event),
                    Ok(Some(Frame::Done)) => {
                        yield Err(A2AError::EndOfStream);
                        return;
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            if buffer.len() > MAX_EVENT_BYTES {
                yield Err(A2AError::Transport(format!(
                    "SSE line exceeds {MAX_EVENT_BYTES} bytes"
                )));
                return;
            }

            match body.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    yield Err(A2AError::Transport(format!("error reading SSE stream: {e}")));
                    return;
                }
                None => break,
            }
        }

        // A body may close without the blank line that ends the last event.
        let trailing = if buffer.is_empty() {
            Ok(None)
        } else {
            pending.push_line(&buffer)
        };
        let frame = match trailing.map(|data| data.or_else(|| pending.finish())) {
            Ok(Some(data)) => parse_event(&data),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        match frame {
            Ok(Some(Frame::Event(event))) => yield Ok(event),
            Ok(Some(Frame::Done)) => yield Err(A2AError::EndOfStream),
            Ok(None) => {}
            Err(e) => yield Err(e),
        }
    }
}

/// `data:` lines of the event being read. Consecutive lines are joined with
/// `\n` and the event is dispatched at the next blank line.
#[derive(Debug, Default)]
struct EventData {
    data: Option<String>,
}

impl EventData {
    /// Feed one line. Returns the event's data once a blank line ends it.
    /// Comments and fields other than `data` are ignored.
    fn push_line(&mut self, raw: &[u8]) -> A2AResult<Option<String>> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| A2AError::Transport(format!("invalid UTF-8 in SSE stream: {e}")))?;
        let line = line.trim_end_matches(&['\n', '\r'][..]);

        if line.is_empty() {
            return Ok(self.finish());
        }
        let Some(value) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let value = value.strip_prefix(' ').unwrap_or(value);

        match self.data.as_mut() {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => self.data = Some(value.to_string()),
        }
        if self.data.as_ref().map_or(0, String::len) > MAX_EVENT_BYTES {
            return Err(A2AError::Transport(format!(
                "SSE event exceeds {MAX_EVENT_BYTES} bytes"
            )));
        }
        Ok(None)
    }

    fn finish(&mut self) -> Option<String> {
        self.data.take()
    }
}

/// Parse the data of one event. Returns `None` for empty data.
///
/// Handles two data formats:
/// 1. **Raw events**: the data is a `StreamResponse` directly.
/// 2. **JSON-RPC wrapped**: the data is a full JSON-RPC response and the
///    event is its `result` (or the call failed with its `error`).
fn parse_event(data: &str) -> A2AResult<Option<Frame>> {
    let data = data.trim();

    if data.is_empty() {
        return Ok(None);
    }

    if data == "[DONE]" {
        return Ok(Some(Frame::Done));
    }

    let value: serde_json::Value = serde_json::from_str(data).map_err(|e| {
        A2AError::InvalidJson(format!("failed to parse SSE event data: {e} (data: {data})"))
    })?;

    let event_value = if value.get("jsonrpc").is_some() {
        if let Some(error) = value.get("error") {
            let error: super::types::JsonRpcError = serde_json::from_value(error.clone())
                .map_err(|e| A2AError::InvalidJson(format!("malformed JSON-RPC error: {e}")))?;
            return Err(error.into());
        }
        value.get("result").cloned().ok_or_else(|| {
            A2AError::InvalidJson(format!(
                "JSON-RPC SSE response has neither 'result' nor 'error': {data}"
            ))
        })?
    } else {
        value
    };

    let event: StreamResponse = serde_json::from_value(event_value).map_err(|e| {
        A2AError::InvalidJson(format!(
            "failed to parse SSE event as StreamResponse: {e} (data: {data})"
        ))
    })?;

    Ok(Some(Frame::Event(event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::error::TASK_NOT_FOUND;
    use std::convert::Infallible;

    fn body(chunks: &[&'static str]) -> SseStream {
        let chunks: Vec<Result<Bytes, Infallible>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        SseStream::from_body(futures::stream::iter(chunks))
    }

    const STATUS: &str = r#"{"kind":"status-update","taskId":"t1","contextId":"c1","status":{"state":"working"},"final":false}"#;

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut event = EventData::default();
        assert!(event.push_line(b": keepalive\n").unwrap().is_none());
        assert!(event.push_line(b"event: update").unwrap().is_none());
        assert!(event.push_line(b"id: 123").unwrap().is_none());
        assert!(event.push_line(b"\n").unwrap().is_none());
        assert!(parse_event("  ").unwrap().is_none());
    }

    #[test]
    fn data_lines_are_joined_until_blank_line() {
        let mut event = EventData::default();
        assert!(event.push_line(b"data: {\"a\":\n").unwrap().is_none());
        assert!(event.push_line(b"data:1}\r\n").unwrap().is_none());
        assert_eq!(event.push_line(b"\r\n").unwrap().as_deref(), Some("{\"a\":\n1}"));
        assert!(event.finish().is_none());
    }

    #[test]
    fn done_sentinel_is_recognised() {
        assert!(matches!(parse_event("[DONE]").unwrap(), Some(Frame::Done)));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_event("{not valid json}").is_err());
    }

    #[tokio::test]
    async fn multi_line_event_is_one_event() {
        let (head, tail) = STATUS.split_at(STATUS.find("\"status\"").unwrap());
        let mut stream = body(&[
            "data: ", head, "\n", "data: ", tail, "\n\n",
            "data: ", STATUS, "\n\n",
        ]);
        assert!(matches!(
            stream.next().await,
            Some(Ok(StreamResponse::StatusUpdate(_)))
        ));
        assert!(matches!(
            stream.next().await,
            Some(Ok(StreamResponse::StatusUpdate(_)))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn unterminated_line_is_capped() {
        let chunk = Bytes::from(vec![b'x'; 64 * 1024]);
        let chunks = std::iter::repeat(chunk)
            .take(MAX_EVENT_BYTES / (64 * 1024) + 2)
            .map(Ok::<_, Infallible>);
        let mut stream = SseStream::from_body(futures::stream::iter(chunks));
        match stream.next().await {
            Some(Err(A2AError::Transport(message))) => assert!(message.contains("exceeds")),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn oversized_event_is_rejected() {
        let line = format!("data: {}\n", "y".repeat(MAX_EVENT_BYTES / 2));
        let chunks: Vec<Result<Bytes, Infallible>> =
            vec![Ok(Bytes::from(line.clone())), Ok(Bytes::from(line)), Ok(Bytes::from("\n"))];
        let mut stream = SseStream::from_body(futures::stream::iter(chunks));
        assert!(matches!(
            stream.next().await,
            Some(Err(A2AError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn events_split_across_chunks() {
        let first = format!("data: {}", &STATUS[..20]);
        let second = format!("{}\n\n", &STATUS[20..]);
        let chunks: Vec<Result<Bytes, Infallible>> =
            vec![Ok(Bytes::from(first)), Ok(Bytes::from(second))];
        let mut stream = SseStream::from_body(futures::stream::iter(chunks));

        let event = stream.next().await.unwrap().unwrap();
        assert!(matches!(event, StreamResponse::StatusUpdate(_)));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn done_ends_the_stream_with_end_of_stream() {
        let mut stream = body(&["data: ", STATUS, "\n\ndata: [DONE]\n\ndata: ", STATUS, "\n"]);
        assert!(stream.next().await.unwrap().is_ok());
        assert!(matches!(
            stream.next().await,
            Some(Err(A2AError::EndOfStream))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn json_rpc_wrapped_error_is_surfaced() {
        let mut stream = body(&[
            r#"data: {"jsonrpc":"2.0","id":"1","error":{"code":-32001,"message":"gone"}}"#,
            "\n",
        ]);
        match stream.next().await {
            Some(Err(err)) => assert_eq!(err.code(), TASK_NOT_FOUND),
            other => panic!("expected error, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn json_rpc_wrapped_result_is_unwrapped() {
        let line = format!("data: {{\"jsonrpc\":\"2.0\",\"id\":\"1\",\"result\":{STATUS}}}\n");
        let chunks: Vec<Result<Bytes, Infallible>> = vec![Ok(Bytes::from(line))];
        let mut stream = SseStream::from_body(futures::stream::iter(chunks));
        assert!(matches!(
            stream.next().await,
            Some(Ok(StreamResponse::StatusUpdate(_)))
        ));
    }
}
