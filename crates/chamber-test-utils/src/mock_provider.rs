// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat provider for deterministic testing.
//!
//! `MockProvider` implements `ChatProvider` with pre-scripted responses,
//! enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use chamber_core::{
    ChamberError, ChatMessage, ChatProvider, ChatRequest, ChatResponse, Choice, FunctionCall,
    ProgressSink, ProviderKind, ProviderProfile, ToolCall,
};

/// A mock chat provider that returns pre-scripted responses.
///
/// Responses are popped from a FIFO queue; every request is recorded for
/// later inspection. When the queue is empty the call fails with a provider
/// error so that tests miscounting their script fail loudly instead of
/// silently passing on a default reply.
pub struct MockProvider {
    profile: ProviderProfile,
    responses: Mutex<VecDeque<Result<ChatResponse, ChamberError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

fn default_profile() -> ProviderProfile {
    ProviderProfile {
        kind: ProviderKind::Ollama,
        model: "test-model".to_string(),
        context_window: 8192,
        has_api_key: false,
    }
}

impl MockProvider {
    /// Create a new mock provider with an empty script.
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    /// Create a mock provider pre-loaded with the given script.
    pub fn with_responses(responses: Vec<Result<ChatResponse, ChamberError>>) -> Self {
        Self {
            profile: default_profile(),
            responses: Mutex::new(VecDeque::from(responses)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replace the advertised provider profile.
    pub fn with_profile(mut self, profile: ProviderProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Append a plain-text assistant reply to the script.
    pub async fn add_text(&self, text: &str) {
        self.add(Ok(text_response(text))).await;
    }

    /// Append a scripted result to the end of the queue.
    pub async fn add(&self, response: Result<ChatResponse, ChamberError>) {
        self.responses.lock().await.push_back(response);
    }

    /// Every request received so far, in call order.
    pub async fn recorded(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of chat calls received so far.
    pub async fn calls(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        self.profile.clone()
    }

    async fn chat(
        &self,
        request: ChatRequest,
        _progress: Option<ProgressSink>,
    ) -> Result<ChatResponse, ChamberError> {
        self.requests.lock().await.push(request);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| {
                Err(ChamberError::Provider {
                    message: "mock response script exhausted".to_string(),
                    source: None,
                })
            })
    }
}

/// Build a single-choice text response, as providers return for normal replies.
pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        choices: vec![Choice {
            message: ChatMessage::assistant(text),
            finish_reason: Some("stop".to_string()),
        }],
        model: "test-model".to_string(),
        thinking: None,
    }
}

/// Build a response whose assistant message carries one tool call.
pub fn tool_call_response(id: &str, name: &str, arguments: Value) -> ChatResponse {
    let call = ToolCall {
        id: id.to_string(),
        call_type: "function".to_string(),
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    };
    ChatResponse {
        choices: vec![Choice {
            message: ChatMessage::assistant_tool_calls(vec![call]),
            finish_reason: Some("tool_calls".to_string()),
        }],
        model: "test-model".to_string(),
        thinking: None,
    }
}
