// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming body parsers for the local backends.
//!
//! LM Studio streams OpenAI-style SSE terminated by a `[DONE]` data line,
//! parsed with the `eventsource-stream` crate. Ollama streams one JSON
//! object per line. Both parsers carry provider identity so a stall while
//! reading the body surfaces as the typed timeout error.

use std::pin::Pin;
use std::time::Instant;

use bytes::BytesMut;
use chamber_core::types::ProviderKind;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{self, Stream, StreamExt};

use crate::error::ProviderError;
use crate::wire::{DONE_SENTINEL, OllamaResponse, StreamChunk};

/// Parses an OpenAI-compatible SSE response into a stream of chunks.
///
/// The `[DONE]` sentinel is swallowed; the stream ends when the server
/// closes the connection.
pub fn parse_chunk_stream(
    response: reqwest::Response,
    provider: ProviderKind,
    started: Instant,
) -> Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>> {
    let events = response.bytes_stream().eventsource();

    let mapped = events.filter_map(move |result| async move {
        match result {
            Ok(event) => {
                if event.data.trim() == DONE_SENTINEL {
                    return None;
                }
                Some(
                    serde_json::from_str::<StreamChunk>(&event.data).map_err(|e| {
                        ProviderError::InvalidResponse {
                            detail: format!("malformed stream chunk: {e}"),
                        }
                    }),
                )
            }
            Err(EventStreamError::Transport(e)) if e.is_timeout() => {
                Some(Err(ProviderError::Timeout {
                    provider,
                    elapsed: started.elapsed(),
                }))
            }
            Err(e) => Some(Err(ProviderError::Network {
                detail: format!("stream error: {e}"),
            })),
        }
    });

    Box::pin(mapped)
}

/// Parses an Ollama newline-delimited JSON response into a stream of
/// [`OllamaResponse`] objects. A trailing line without a newline is still
/// delivered when the body ends.
pub fn parse_ndjson_stream(
    response: reqwest::Response,
    provider: ProviderKind,
    started: Instant,
) -> Pin<Box<dyn Stream<Item = Result<OllamaResponse, ProviderError>> + Send>> {
    // Wrap each chunk in Some and chain a final None so the line buffer can
    // be flushed once the body ends.
    let source = response
        .bytes_stream()
        .map(move |result| {
            Some(result.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        provider,
                        elapsed: started.elapsed(),
                    }
                } else {
                    ProviderError::Network {
                        detail: format!("stream error: {e}"),
                    }
                }
            }))
        })
        .chain(stream::once(futures::future::ready(None)));

    let lines = source
        .scan(BytesMut::new(), |buffer, item| {
            let emitted = match item {
                Some(Ok(bytes)) => {
                    buffer.extend_from_slice(&bytes);
                    drain_lines(buffer)
                }
                Some(Err(e)) => vec![Err(e)],
                None => {
                    let tail = String::from_utf8_lossy(buffer).trim().to_string();
                    buffer.clear();
                    if tail.is_empty() {
                        Vec::new()
                    } else {
                        vec![Ok(tail)]
                    }
                }
            };
            futures::future::ready(Some(emitted))
        })
        .flat_map(stream::iter)
        .map(|result| result.and_then(parse_line));

    Box::pin(lines)
}

fn drain_lines(buffer: &mut BytesMut) -> Vec<Result<String, ProviderError>> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let raw = buffer.split_to(pos + 1);
        let text = String::from_utf8_lossy(&raw).trim().to_string();
        if !text.is_empty() {
            lines.push(Ok(text));
        }
    }
    lines
}

fn parse_line(line: String) -> Result<OllamaResponse, ProviderError> {
    serde_json::from_str(&line).map_err(|e| ProviderError::InvalidResponse {
        detail: format!("malformed stream line: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    /// Serve `body` with the given content type and return a live response.
    async fn mock_stream_response(content_type: &str, body: &str) -> reqwest::Response {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", content_type)
                    .set_body_string(body.to_string()),
            )
            .mount(&server)
            .await;

        reqwest::get(&server.uri()).await.unwrap()
    }

    #[tokio::test]
    async fn sse_chunks_parse_and_done_is_swallowed() {
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        let response = mock_stream_response("text/event-stream", sse).await;
        let mut stream = parse_chunk_stream(response, ProviderKind::LmStudio, Instant::now());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.choices[0].delta.content.as_deref(), Some("Hel"));

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.choices[0].delta.content.as_deref(), Some("lo"));
        assert_eq!(second.choices[0].finish_reason.as_deref(), Some("stop"));

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn malformed_sse_chunk_is_invalid_response() {
        let sse = "data: not json\n\n";
        let response = mock_stream_response("text/event-stream", sse).await;
        let mut stream = parse_chunk_stream(response, ProviderKind::LmStudio, Instant::now());

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn ndjson_lines_parse_in_order() {
        let body = concat!(
            "{\"model\":\"llama3.1\",\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"done_reason\":\"stop\"}\n",
        );
        let response = mock_stream_response("application/x-ndjson", body).await;
        let mut stream = parse_ndjson_stream(response, ProviderKind::Ollama, Instant::now());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.model.as_deref(), Some("llama3.1"));
        assert_eq!(first.message.unwrap().content, "Hel");

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.message.unwrap().content, "lo");

        let last = stream.next().await.unwrap().unwrap();
        assert!(last.done);
        assert_eq!(last.done_reason.as_deref(), Some("stop"));

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn ndjson_final_line_without_newline_is_flushed() {
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hi\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}",
        );
        let response = mock_stream_response("application/x-ndjson", body).await;
        let mut stream = parse_ndjson_stream(response, ProviderKind::Ollama, Instant::now());

        assert!(!stream.next().await.unwrap().unwrap().done);
        assert!(stream.next().await.unwrap().unwrap().done);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn malformed_ndjson_line_is_invalid_response() {
        let body = "{\"message\":{\"role\":\"assistant\",\"content\":\"ok\"},\"done\":false}\nnot json\n";
        let response = mock_stream_response("application/x-ndjson", body).await;
        let mut stream = parse_ndjson_stream(response, ProviderKind::Ollama, Instant::now());

        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[test]
    fn drain_lines_holds_partial_tail() {
        let mut buffer = BytesMut::from(&b"{\"done\":false}\n{\"do"[..]);
        let drained = drain_lines(&mut buffer);
        assert_eq!(drained.len(), 1);
        assert_eq!(&buffer[..], b"{\"do");
    }
}
