// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved per-call settings for one backend.

use std::time::Duration;

use chamber_config::ProvidersConfig;
use chamber_core::ProviderKind;

/// Everything a single chat call needs to know about its backend, resolved
/// from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    /// Full URL of the chat endpoint.
    pub endpoint: String,
    pub model: String,
    pub context_window: u32,
    pub temperature: f64,
    /// Reply length cap; only the cloud backend sends one.
    pub max_tokens: Option<u32>,
    pub api_key: Option<String>,
    pub referer: Option<String>,
    pub title: Option<String>,
    pub timeout: Duration,
}

impl ProviderSettings {
    /// Resolve settings for `kind` from the layered configuration.
    pub fn resolve(kind: ProviderKind, providers: &ProvidersConfig) -> Self {
        match kind {
            ProviderKind::Cloud => {
                let cloud = &providers.cloud;
                Self {
                    kind,
                    endpoint: cloud.api_url.clone(),
                    model: cloud.model.clone(),
                    context_window: cloud.context_window,
                    temperature: cloud.temperature,
                    max_tokens: Some(cloud.max_tokens),
                    api_key: cloud.api_key.clone(),
                    referer: cloud.referer.clone(),
                    title: cloud.title.clone(),
                    timeout: Duration::from_secs(cloud.timeout_secs),
                }
            }
            ProviderKind::Ollama => {
                let ollama = &providers.ollama;
                Self {
                    kind,
                    endpoint: chat_url(&ollama.endpoint, "/api/chat"),
                    model: ollama.model.clone(),
                    context_window: ollama.context_window,
                    temperature: ollama.temperature,
                    max_tokens: None,
                    api_key: None,
                    referer: None,
                    title: None,
                    timeout: Duration::from_secs(ollama.timeout_secs),
                }
            }
            ProviderKind::LmStudio => {
                let lmstudio = &providers.lmstudio;
                Self {
                    kind,
                    endpoint: chat_url(&lmstudio.endpoint, "/v1/chat/completions"),
                    model: lmstudio.model.clone(),
                    context_window: lmstudio.context_window,
                    temperature: lmstudio.temperature,
                    max_tokens: None,
                    api_key: None,
                    referer: None,
                    title: None,
                    timeout: Duration::from_secs(lmstudio.timeout_secs),
                }
            }
        }
    }

    /// The active backend's settings.
    pub fn active(providers: &ProvidersConfig) -> Self {
        Self::resolve(providers.active, providers)
    }
}

fn chat_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
