// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Rhythm Chamber turn engine.
//!
//! Message and session shapes follow the OpenAI chat-completions wire format
//! so that histories round-trip unchanged through every provider backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role of a chat message author.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in a conversation history.
///
/// `content` is `None` for assistant messages that carry only tool calls.
/// Messages appended to a session history are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,

    /// Tool invocations requested by an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Links a `tool` message back to the call it answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Marks assistant messages produced by the failure path.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// An assistant message requesting tool invocations, with no text body.
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
            error: false,
        }
    }

    /// A tool result message answering the call identified by `call_id`.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
            error: false,
        }
    }

    /// An assistant message flagged as produced by the failure path.
    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            error: true,
            ..Self::text(Role::Assistant, content)
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            error: false,
        }
    }

    /// Text content, or the empty string for content-less messages.
    pub fn text_content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// True when the message carries at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,

    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,

    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// The function name and argument payload inside a tool call.
///
/// Cloud-style providers encode `arguments` as a JSON string; Ollama-style
/// providers send an object. [`FunctionCall::parse_args`] resolves both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,

    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl FunctionCall {
    /// Decode the argument payload into a JSON object.
    ///
    /// String payloads are parsed as JSON; anything else is passed through.
    /// An empty string decodes to `{}`.
    pub fn parse_args(&self) -> Result<serde_json::Value, serde_json::Error> {
        match &self.arguments {
            serde_json::Value::String(raw) if raw.trim().is_empty() => {
                Ok(serde_json::Value::Object(Default::default()))
            }
            serde_json::Value::String(raw) => serde_json::from_str(raw),
            serde_json::Value::Null => Ok(serde_json::Value::Object(Default::default())),
            other => Ok(other.clone()),
        }
    }
}

/// OpenAI-style function tool definition advertised to providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolSpecFunction,
}

/// Name, description, and JSON schema of an advertised function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpecFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: ToolSpecFunction {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// A normalized request to a chat provider.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,

    /// Function definitions to advertise, if the call allows tool use.
    pub tools: Option<Vec<ToolSpec>>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = if tools.is_empty() { None } else { Some(tools) };
        self
    }
}

/// A normalized response from any chat provider backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub model: String,

    /// Reasoning text stripped from the reply body, when the model emitted any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

impl ChatResponse {
    /// The first choice's message, which every backend is normalized to provide.
    pub fn message(&self) -> Option<&ChatMessage> {
        self.choices.first().map(|c| &c.message)
    }
}

/// One completion choice inside a [`ChatResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Identifies a provider backend. The set is closed: adding a backend is a
/// compile-time change, not a runtime string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted HTTPS API with bearer-token auth.
    Cloud,
    /// Local Ollama daemon (`/api/chat`).
    Ollama,
    /// Local OpenAI-compatible server such as LM Studio (`/v1/chat/completions`).
    LmStudio,
}

impl ProviderKind {
    /// Local backends stream; the cloud backend does not.
    pub fn supports_streaming(self) -> bool {
        !matches!(self, ProviderKind::Cloud)
    }
}

/// An incremental output event from a streaming provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    /// Text inside a `<think>` block.
    Thinking(String),
    /// Visible reply text.
    Token(String),
}

/// A persisted conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    pub created_at: String,

    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(default)]
    pub metadata: SessionMetadata,
}

/// Presentation metadata attached to a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality_emoji: Option<String>,

    #[serde(default)]
    pub is_lite_mode: bool,
}

/// The synchronous last-chance snapshot written when the host is closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyBackup {
    pub session_id: String,
    pub created_at: String,
    pub messages: Vec<ChatMessage>,
    /// Write instant in epoch milliseconds.
    pub timestamp: i64,
}

/// One playback event from the listener's streaming history export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub ts: DateTime<Utc>,
    pub artist: String,
    pub track: String,
    pub ms_played: u64,
}

impl StreamRecord {
    pub fn hours_played(&self) -> f64 {
        self.ms_played as f64 / 3_600_000.0
    }
}

/// Aggregate listening facts used when no model-generated reply is available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenerProfile {
    pub top_artist: Option<String>,
    pub total_hours: f64,
    /// Artists with a heavy play history and nothing recent.
    pub ghosted_artists: Vec<String>,
}
