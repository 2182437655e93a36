// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client dispatching chat calls to the configured backend.
//!
//! Provides [`ProviderClient`] which handles request construction,
//! authentication, streaming, per-call timeouts, and transient error retry.
//! Whatever the backend, callers receive the normalized [`ChatResponse`]
//! shape with reasoning text split out into `thinking`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chamber_core::error::ChamberError;
use chamber_core::traits::{ChatProvider, ProgressSink, ProviderProfile};
use chamber_core::types::{ChatRequest, ChatResponse, ProviderKind, StreamDelta};
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::settings::ProviderSettings;
use crate::stream::{parse_chunk_stream, parse_ndjson_stream};
use crate::think::{Segment, ThinkScanner};
use crate::wire::{
    self, OllamaMessage, OllamaOptions, OllamaRequest, OllamaResponse, OllamaToolCall,
    OpenAiRequest, ToolCallAssembler,
};

/// Delay before the single retry of a transient failure.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// HTTP client for one configured provider backend.
///
/// Manages authentication headers, connection pooling, and retry logic for
/// transient errors (429, 500, 503, 529). Construct a new client after a
/// provider or settings switch.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    settings: ProviderSettings,
    http: reqwest::Client,
    max_retries: u32,
}

impl ProviderClient {
    /// Creates a client for the backend described by `settings`.
    ///
    /// Cloud settings contribute bearer-token and attribution headers; the
    /// local backends send plain JSON. The per-call timeout is enforced by
    /// the underlying HTTP client, covering the full body read.
    pub fn new(settings: ProviderSettings) -> Result<Self, ChamberError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &settings.api_key {
            let bearer = format!("Bearer {key}");
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&bearer).map_err(|e| {
                    ChamberError::Config(format!("invalid API key header value: {e}"))
                })?,
            );
        }
        if let Some(referer) = &settings.referer {
            headers.insert(
                "HTTP-Referer",
                HeaderValue::from_str(referer).map_err(|e| {
                    ChamberError::Config(format!("invalid referer header value: {e}"))
                })?,
            );
        }
        if let Some(title) = &settings.title {
            headers.insert(
                "X-Title",
                HeaderValue::from_str(title).map_err(|e| {
                    ChamberError::Config(format!("invalid title header value: {e}"))
                })?,
            );
        }
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ChamberError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            settings,
            http,
            max_retries: 1,
        })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Dispatches one chat call to the configured backend.
    ///
    /// When `progress` is supplied and the backend streams, deltas are
    /// forwarded as they arrive; the call still resolves with the complete
    /// synthesized response. The cloud backend never streams.
    pub async fn call(
        &self,
        request: &ChatRequest,
        progress: Option<&ProgressSink>,
    ) -> Result<ChatResponse, ProviderError> {
        let started = Instant::now();
        let streaming = progress.is_some() && self.settings.kind.supports_streaming();
        debug!(
            provider = %self.settings.kind,
            model = %self.settings.model,
            streaming,
            messages = request.messages.len(),
            "dispatching chat call"
        );

        match self.settings.kind {
            ProviderKind::Cloud | ProviderKind::LmStudio => {
                self.call_openai(request, streaming, progress, started).await
            }
            ProviderKind::Ollama => self.call_ollama(request, streaming, progress, started).await,
        }
    }

    async fn call_openai(
        &self,
        request: &ChatRequest,
        streaming: bool,
        progress: Option<&ProgressSink>,
        started: Instant,
    ) -> Result<ChatResponse, ProviderError> {
        let body = OpenAiRequest {
            model: &self.settings.model,
            messages: &request.messages,
            tools: request.tools.as_deref(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            stream: streaming,
        };
        let response = self.send_with_retry(&body, started).await?;

        if streaming {
            self.consume_chunk_stream(response, progress, started).await
        } else {
            let parsed: ChatResponse =
                response
                    .json()
                    .await
                    .map_err(|e| ProviderError::InvalidResponse {
                        detail: format!("failed to decode response body: {e}"),
                    })?;
            if parsed.choices.is_empty() {
                return Err(ProviderError::InvalidResponse {
                    detail: "response carried no choices".to_string(),
                });
            }
            Ok(wire::normalize_openai(parsed))
        }
    }

    async fn call_ollama(
        &self,
        request: &ChatRequest,
        streaming: bool,
        progress: Option<&ProgressSink>,
        started: Instant,
    ) -> Result<ChatResponse, ProviderError> {
        let messages: Vec<OllamaMessage> = request
            .messages
            .iter()
            .map(OllamaMessage::from_chat)
            .collect();
        let body = OllamaRequest {
            model: &self.settings.model,
            messages,
            stream: streaming,
            tools: request.tools.as_deref(),
            options: OllamaOptions {
                temperature: self.settings.temperature,
            },
        };
        let response = self.send_with_retry(&body, started).await?;

        if streaming {
            self.consume_ndjson_stream(response, progress, started)
                .await
        } else {
            let parsed: OllamaResponse =
                response
                    .json()
                    .await
                    .map_err(|e| ProviderError::InvalidResponse {
                        detail: format!("failed to decode response body: {e}"),
                    })?;
            if parsed.message.is_none() {
                return Err(ProviderError::InvalidResponse {
                    detail: "reply carried no message".to_string(),
                });
            }
            Ok(wire::normalize_ollama(parsed, &self.settings.model))
        }
    }

    /// Sends the request, retrying once after [`RETRY_DELAY`] on a transient
    /// status. Returns the response with a success status.
    async fn send_with_retry<T: Serialize + ?Sized + Sync>(
        &self,
        body: &T,
        started: Instant,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying chat request after transient error");
                tokio::time::sleep(RETRY_DELAY).await;
            }

            let response = self
                .http
                .post(&self.settings.endpoint)
                .json(body)
                .send()
                .await
                .map_err(|e| self.transport_error(e, started))?;

            let status = response.status();
            debug!(status = %status, attempt, "chat response received");

            if status.is_success() {
                return Ok(response);
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(status_error(status, body));
                continue;
            }

            // Non-transient error or exhausted retries.
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Network {
            detail: "chat request failed after retries".to_string(),
        }))
    }

    fn transport_error(&self, error: reqwest::Error, started: Instant) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout {
                provider: self.settings.kind,
                elapsed: started.elapsed(),
            }
        } else {
            ProviderError::Network {
                detail: format!("HTTP request failed: {error}"),
            }
        }
    }

    async fn consume_chunk_stream(
        &self,
        response: reqwest::Response,
        progress: Option<&ProgressSink>,
        started: Instant,
    ) -> Result<ChatResponse, ProviderError> {
        let mut chunks = parse_chunk_stream(response, self.settings.kind, started);
        let mut scanner = ThinkScanner::new();
        let mut assembler = ToolCallAssembler::new();
        let mut visible = String::new();
        let mut thinking = String::new();
        let mut finish_reason = None;
        let mut model = None;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if model.is_none() {
                model = chunk.model;
            }
            for choice in chunk.choices {
                if let Some(reason) = choice.finish_reason {
                    finish_reason = Some(reason);
                }
                if let Some(fragments) = &choice.delta.tool_calls {
                    assembler.absorb(fragments);
                }
                if let Some(content) = &choice.delta.content {
                    emit_segments(scanner.feed(content), &mut visible, &mut thinking, progress);
                }
            }
        }
        emit_segments(scanner.finish(), &mut visible, &mut thinking, progress);

        Ok(wire::assemble_response(
            model.unwrap_or_else(|| self.settings.model.clone()),
            visible,
            Some(thinking),
            assembler.finish(),
            finish_reason,
        ))
    }

    async fn consume_ndjson_stream(
        &self,
        response: reqwest::Response,
        progress: Option<&ProgressSink>,
        started: Instant,
    ) -> Result<ChatResponse, ProviderError> {
        let mut items = parse_ndjson_stream(response, self.settings.kind, started);
        let mut scanner = ThinkScanner::new();
        let mut visible = String::new();
        let mut inline_thinking = String::new();
        let mut native_thinking = String::new();
        let mut tool_calls: Vec<OllamaToolCall> = Vec::new();
        let mut done_reason = None;
        let mut model = None;

        while let Some(item) = items.next().await {
            let item = item?;
            if model.is_none() {
                model = item.model;
            }
            if let Some(message) = item.message {
                if let Some(batch) = message.tool_calls {
                    tool_calls.extend(batch);
                }
                if let Some(text) = message.thinking {
                    if let Some(sink) = progress {
                        let _ = sink.send(StreamDelta::Thinking(text.clone()));
                    }
                    native_thinking.push_str(&text);
                }
                if !message.content.is_empty() {
                    emit_segments(
                        scanner.feed(&message.content),
                        &mut visible,
                        &mut inline_thinking,
                        progress,
                    );
                }
            }
            if item.done {
                done_reason = item.done_reason;
            }
        }
        emit_segments(
            scanner.finish(),
            &mut visible,
            &mut inline_thinking,
            progress,
        );

        let thinking = if native_thinking.trim().is_empty() {
            inline_thinking
        } else {
            native_thinking
        };
        let tool_calls = if tool_calls.is_empty() {
            None
        } else {
            Some(wire::assign_call_ids(tool_calls))
        };

        Ok(wire::assemble_response(
            model.unwrap_or_else(|| self.settings.model.clone()),
            visible,
            Some(thinking),
            tool_calls,
            done_reason,
        ))
    }
}

#[async_trait]
impl ChatProvider for ProviderClient {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            kind: self.settings.kind,
            model: self.settings.model.clone(),
            context_window: self.settings.context_window,
            has_api_key: self.settings.api_key.is_some(),
        }
    }

    async fn chat(
        &self,
        request: ChatRequest,
        progress: Option<ProgressSink>,
    ) -> Result<ChatResponse, ChamberError> {
        self.call(&request, progress.as_ref())
            .await
            .map_err(ChamberError::from)
    }
}

/// Forward scanner segments to the progress sink and the accumulators.
fn emit_segments(
    segments: Vec<Segment>,
    visible: &mut String,
    thinking: &mut String,
    progress: Option<&ProgressSink>,
) {
    for segment in segments {
        match segment {
            Segment::Visible(text) => {
                if let Some(sink) = progress {
                    let _ = sink.send(StreamDelta::Token(text.clone()));
                }
                visible.push_str(&text);
            }
            Segment::Thinking(text) => {
                if let Some(sink) = progress {
                    let _ = sink.send(StreamDelta::Thinking(text.clone()));
                }
                thinking.push_str(&text);
            }
        }
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth
/// retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

fn status_error(status: StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 => ProviderError::TokenExpired,
        429 => ProviderError::RateLimited,
        code => {
            // Prefer the message field of a structured error body.
            let body = match serde_json::from_str::<wire::ApiErrorBody>(&body) {
                Ok(parsed) => parsed.error.message,
                Err(_) => body,
            };
            ProviderError::Server { status: code, body }
        }
    }
}
