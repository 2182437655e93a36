// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Character-count token estimation calibrated per model family.
//!
//! Exact tokenizers are deliberately out of scope: estimates only steer
//! budgeting decisions, so a calibrated chars-per-token ratio is enough.
//! Ratios come from configuration, keyed by model-name substring, with a
//! conservative 4.0 fallback for unknown families.

use std::collections::HashMap;

use chamber_core::{ChatMessage, ToolSpec};

/// Framing overhead charged per message, in tokens.
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Framing overhead charged once per request, in tokens.
const REQUEST_OVERHEAD_TOKENS: u32 = 3;

/// Built-in chars-per-token calibration, keyed by model-name substring.
const DEFAULT_FAMILY_RATIOS: &[(&str, f64)] = &[
    ("llama", 3.6),
    ("mistral", 3.6),
    ("mixtral", 3.6),
    ("qwen", 3.4),
    ("gemma", 3.5),
    ("deepseek", 3.4),
    ("phi", 3.5),
    ("gpt", 4.0),
    ("claude", 3.8),
];

/// Ratio table driving a [`TokenEstimator`].
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Substring-keyed ratios, longest substring first so the most specific
    /// family wins.
    families: Vec<(String, f64)>,
    default_ratio: f64,
}

impl EstimatorConfig {
    /// Built-in calibration merged with configured overrides.
    ///
    /// An override for an existing substring replaces it; new substrings
    /// extend the table.
    pub fn new(overrides: &HashMap<String, f64>, default_ratio: f64) -> Self {
        let mut families: Vec<(String, f64)> = DEFAULT_FAMILY_RATIOS
            .iter()
            .map(|(family, ratio)| (family.to_string(), *ratio))
            .collect();
        for (family, ratio) in overrides {
            let key = family.to_lowercase();
            match families.iter_mut().find(|(f, _)| *f == key) {
                Some(entry) => entry.1 = *ratio,
                None => families.push((key, *ratio)),
            }
        }
        families.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        Self {
            families,
            default_ratio,
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::new(&HashMap::new(), 4.0)
    }
}

/// Estimates token usage from character counts.
#[derive(Debug, Clone, Default)]
pub struct TokenEstimator {
    config: EstimatorConfig,
}

impl TokenEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Chars-per-token ratio for a model, by case-insensitive substring match.
    pub fn ratio_for_model(&self, model: &str) -> f64 {
        let model = model.to_lowercase();
        self.config
            .families
            .iter()
            .find(|(family, _)| model.contains(family.as_str()))
            .map(|(_, ratio)| *ratio)
            .unwrap_or(self.config.default_ratio)
    }

    /// Estimated tokens for a bare text span. Empty text is zero.
    pub fn estimate_text(&self, model: &str, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let ratio = self.ratio_for_model(model);
        (text.chars().count() as f64 / ratio).ceil() as u32
    }

    /// Estimated tokens for one message, including framing overhead and any
    /// tool-call payloads.
    pub fn estimate_message(&self, model: &str, message: &ChatMessage) -> u32 {
        let mut tokens = MESSAGE_OVERHEAD_TOKENS + self.estimate_text(model, message.text_content());
        if let Some(calls) = &message.tool_calls {
            let serialized = serde_json::to_string(calls).unwrap_or_default();
            tokens += self.estimate_text(model, &serialized);
        }
        tokens
    }

    /// Estimated tokens for a message list, including per-request framing.
    pub fn estimate_messages(&self, model: &str, messages: &[ChatMessage]) -> u32 {
        if messages.is_empty() {
            return 0;
        }
        REQUEST_OVERHEAD_TOKENS
            + messages
                .iter()
                .map(|m| self.estimate_message(model, m))
                .sum::<u32>()
    }

    /// Estimated tokens for advertised tool schemas.
    pub fn estimate_tools(&self, model: &str, tools: &[ToolSpec]) -> u32 {
        if tools.is_empty() {
            return 0;
        }
        let serialized = serde_json::to_string(tools).unwrap_or_default();
        self.estimate_text(model, &serialized)
    }
}
