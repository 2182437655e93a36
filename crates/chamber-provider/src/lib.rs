// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider router for the Rhythm Chamber turn engine.
//!
//! Dispatches chat calls to the configured backend: a hosted cloud API with
//! bearer-token auth, a local Ollama daemon, or a local OpenAI-compatible
//! server such as LM Studio. Every backend's reply is normalized to the same
//! response shape, `<think>` reasoning is split out of the visible text, and
//! the local backends stream incremental deltas through a progress sink.

pub mod client;
pub mod error;
pub mod settings;
pub mod stream;
pub mod think;
pub mod wire;

use chamber_config::ProvidersConfig;
use chamber_core::error::ChamberError;

pub use client::ProviderClient;
pub use error::ProviderError;
pub use settings::ProviderSettings;
pub use think::{Segment, ThinkScanner, split_thinking};

/// Build a client for the backend selected by `providers.active`.
pub fn provider_for_config(providers: &ProvidersConfig) -> Result<ProviderClient, ChamberError> {
    ProviderClient::new(ProviderSettings::active(providers))
}
