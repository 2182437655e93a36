// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-format request and response bodies for the provider backends.
//!
//! Cloud and LM Studio speak the OpenAI chat-completions format; Ollama has
//! its own envelope with id-less tool calls. Every backend is funnelled into
//! the normalized [`ChatResponse`] shape so callers never see the difference.

use chamber_core::types::{
    ChatMessage, ChatResponse, Choice, FunctionCall, Role, ToolCall, ToolSpec,
};
use serde::{Deserialize, Serialize};

use crate::think::split_thinking;

/// Data line closing an OpenAI-style SSE stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Request body for OpenAI-compatible endpoints (cloud and LM Studio).
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [ToolSpec]>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    pub temperature: f64,
    pub stream: bool,
}

/// Move inline `<think>` regions in the first choice to the top-level
/// `thinking` field. Responses that already carry one are left alone.
pub fn normalize_openai(mut response: ChatResponse) -> ChatResponse {
    if response.thinking.is_none() {
        if let Some(choice) = response.choices.first_mut() {
            if let Some(content) = choice.message.content.take() {
                let (visible, thinking) = split_thinking(&content);
                choice.message.content = Some(visible);
                response.thinking = thinking;
            }
        }
    }
    response
}

/// Structured error body some backends return alongside a failure status.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}

/// One chunk of an OpenAI-compatible streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental message content inside a streaming chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
}

/// A partial tool call carried by one streaming chunk.
///
/// The id and name arrive on the first fragment for an index; argument text
/// accumulates across subsequent fragments.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallFragment {
    #[serde(default)]
    pub index: usize,

    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub function: FunctionFragment,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionFragment {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub arguments: Option<String>,
}

/// Accumulates streamed tool-call fragments into complete [`ToolCall`]s.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    partial: Vec<PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, fragments: &[ToolCallFragment]) {
        for fragment in fragments {
            if self.partial.len() <= fragment.index {
                self.partial
                    .resize_with(fragment.index + 1, PartialCall::default);
            }
            let slot = &mut self.partial[fragment.index];
            if let Some(id) = &fragment.id {
                slot.id = Some(id.clone());
            }
            if let Some(name) = &fragment.function.name {
                slot.name.push_str(name);
            }
            if let Some(arguments) = &fragment.function.arguments {
                slot.arguments.push_str(arguments);
            }
        }
    }

    /// The assembled calls, or `None` when no fragments ever arrived.
    /// Calls missing an id get a synthesized `call_N`.
    pub fn finish(self) -> Option<Vec<ToolCall>> {
        if self.partial.is_empty() {
            return None;
        }
        let calls = self
            .partial
            .into_iter()
            .enumerate()
            .map(|(index, partial)| ToolCall {
                id: partial.id.unwrap_or_else(|| format!("call_{index}")),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: partial.name,
                    arguments: serde_json::Value::String(partial.arguments),
                },
            })
            .collect();
        Some(calls)
    }
}

/// Request body for the Ollama `/api/chat` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [ToolSpec]>,

    pub options: OllamaOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct OllamaOptions {
    pub temperature: f64,
}

/// Ollama's message shape: bare `content` string, id-less tool calls.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaMessage {
    pub role: Role,
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OllamaToolCall>>,
}

impl OllamaMessage {
    /// Map a history message onto Ollama's shape. String-encoded argument
    /// payloads from OpenAI-style backends are decoded back into objects.
    pub fn from_chat(message: &ChatMessage) -> Self {
        let tool_calls = message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| OllamaToolCall {
                    function: OllamaFunction {
                        name: call.function.name.clone(),
                        arguments: call
                            .function
                            .parse_args()
                            .unwrap_or_else(|_| call.function.arguments.clone()),
                    },
                })
                .collect()
        });
        Self {
            role: message.role,
            content: message.text_content().to_string(),
            tool_calls,
        }
    }
}

/// An id-less tool call as Ollama emits and accepts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaToolCall {
    pub function: OllamaFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaFunction {
    pub name: String,

    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One response object from `/api/chat`.
///
/// Non-streaming calls return exactly one with `done: true`; streaming calls
/// return one JSON object per line, the last carrying `done: true`.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaResponse {
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub message: Option<OllamaResponseMessage>,

    #[serde(default)]
    pub done: bool,

    #[serde(default)]
    pub done_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaResponseMessage {
    #[serde(default)]
    pub content: String,

    /// Reasoning text, populated by models run with thinking enabled.
    #[serde(default)]
    pub thinking: Option<String>,

    #[serde(default)]
    pub tool_calls: Option<Vec<OllamaToolCall>>,
}

/// Normalize a non-streaming Ollama reply.
pub fn normalize_ollama(response: OllamaResponse, fallback_model: &str) -> ChatResponse {
    let model = response.model.unwrap_or_else(|| fallback_model.to_string());
    let message = response.message.unwrap_or_default();
    let (visible, inline_thinking) = split_thinking(&message.content);
    let thinking = message
        .thinking
        .filter(|t| !t.trim().is_empty())
        .or(inline_thinking);
    let tool_calls = message
        .tool_calls
        .filter(|calls| !calls.is_empty())
        .map(assign_call_ids);
    assemble_response(model, visible, thinking, tool_calls, response.done_reason)
}

/// Ollama omits call ids; synthesize stable ones for the tool loop.
pub fn assign_call_ids(calls: Vec<OllamaToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .enumerate()
        .map(|(index, call)| ToolCall {
            id: format!("call_{index}"),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: call.function.name,
                arguments: call.function.arguments,
            },
        })
        .collect()
}

/// Build the normalized single-choice response a finished stream (or an
/// Ollama reply) produces.
pub fn assemble_response(
    model: String,
    visible: String,
    thinking: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
    finish_reason: Option<String>,
) -> ChatResponse {
    let tool_calls = tool_calls.filter(|calls| !calls.is_empty());
    let finish_reason = if tool_calls.is_some() {
        Some("tool_calls".to_string())
    } else {
        Some(finish_reason.unwrap_or_else(|| "stop".to_string()))
    };
    ChatResponse {
        choices: vec![Choice {
            message: ChatMessage {
                role: Role::Assistant,
                content: Some(visible),
                tool_calls,
                tool_call_id: None,
                error: false,
            },
            finish_reason,
        }],
        model,
        thinking: thinking.filter(|t| !t.trim().is_empty()),
    }
}
