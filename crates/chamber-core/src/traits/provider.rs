// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat provider capability implemented by every LLM backend.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChamberError;
use crate::types::{ChatRequest, ChatResponse, ProviderKind, StreamDelta};

/// Channel end that receives incremental output during a streaming call.
pub type ProgressSink = mpsc::UnboundedSender<StreamDelta>;

/// Static facts about a provider backend the orchestrator needs before
/// dispatching a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub kind: ProviderKind,
    pub model: String,
    /// Context window of the configured model, in tokens.
    pub context_window: u32,
    pub has_api_key: bool,
}

/// A chat completion backend.
///
/// When `progress` is supplied and the backend supports streaming, deltas are
/// forwarded as they arrive and the call still resolves with the complete
/// synthesized response. Backends without streaming ignore the sink.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn profile(&self) -> ProviderProfile;

    async fn chat(
        &self,
        request: ChatRequest,
        progress: Option<ProgressSink>,
    ) -> Result<ChatResponse, ChamberError>;
}
