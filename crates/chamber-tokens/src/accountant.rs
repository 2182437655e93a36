// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request-level token accounting against the active context window.

use serde::Serialize;
use tracing::debug;

use chamber_core::{ChatMessage, Role, ToolSpec};

use crate::estimator::TokenEstimator;

/// Utilization at which an informational heads-up is recorded.
const INFO_THRESHOLD: f64 = 0.70;

/// Utilization thresholds steering the recommendation.
#[derive(Debug, Clone, Copy)]
pub struct BudgetThresholds {
    /// At or above this utilization the user should be warned.
    pub warn: f64,
    /// At or above this utilization history must be truncated.
    pub truncate: f64,
    /// Truncation aims at this fraction of the context window.
    pub target_ratio: f64,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            warn: 0.85,
            truncate: 0.95,
            target_ratio: 0.9,
        }
    }
}

/// The inputs of one provider request, viewed for accounting.
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    pub messages: &'a [ChatMessage],
    pub system_prompt: &'a str,
    pub rag_context: Option<&'a str>,
    pub tools: Option<&'a [ToolSpec]>,
}

/// What to do about the current context usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAction {
    Ok,
    WarnUser,
    Truncate,
    /// Even the untouchable floor (system prompt plus the last user message)
    /// exceeds the window; truncation cannot help.
    Reject,
}

/// Severity of a [`TokenWarning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarnLevel {
    Info,
    Warn,
    Critical,
}

/// One warning attached to a [`TokenInfo`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenWarning {
    pub level: WarnLevel,
    pub message: String,
}

/// The recommendation attached to a [`TokenInfo`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub action: BudgetAction,
    pub message: String,
}

/// Token accounting for one prospective request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub message_tokens: u32,
    pub system_prompt_tokens: u32,
    pub rag_context_tokens: u32,
    pub tool_schema_tokens: u32,
    pub total_tokens: u32,
    pub context_window: u32,
    /// `total_tokens / context_window`, unclamped.
    pub utilization: f64,
    pub warnings: Vec<TokenWarning>,
    pub recommendation: Recommendation,
}

/// Produces [`TokenInfo`] for prospective requests.
#[derive(Debug, Clone, Default)]
pub struct TokenAccountant {
    estimator: TokenEstimator,
    thresholds: BudgetThresholds,
}

impl TokenAccountant {
    pub fn new(estimator: TokenEstimator, thresholds: BudgetThresholds) -> Self {
        Self {
            estimator,
            thresholds,
        }
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    pub fn thresholds(&self) -> BudgetThresholds {
        self.thresholds
    }

    /// Token count truncation should aim for within `context_window`.
    pub fn truncate_target(&self, context_window: u32) -> u32 {
        (context_window as f64 * self.thresholds.target_ratio).floor() as u32
    }

    /// Account one prospective request against the model's context window.
    pub fn account(&self, model: &str, context_window: u32, parts: RequestParts<'_>) -> TokenInfo {
        let message_tokens = self.estimator.estimate_messages(model, parts.messages);
        let system_prompt_tokens = self.estimator.estimate_text(model, parts.system_prompt);
        let rag_context_tokens = parts
            .rag_context
            .map(|rag| self.estimator.estimate_text(model, rag))
            .unwrap_or(0);
        let tool_schema_tokens = parts
            .tools
            .map(|tools| self.estimator.estimate_tools(model, tools))
            .unwrap_or(0);

        let total_tokens =
            message_tokens + system_prompt_tokens + rag_context_tokens + tool_schema_tokens;
        let utilization = if context_window == 0 {
            0.0
        } else {
            total_tokens as f64 / context_window as f64
        };

        let mut warnings = Vec::new();
        let recommendation = if self.floor_tokens(model, parts) > context_window {
            warnings.push(TokenWarning {
                level: WarnLevel::Critical,
                message: "the latest message alone does not fit the context window".to_string(),
            });
            Recommendation {
                action: BudgetAction::Reject,
                message: "This message is too long for the configured model. Shorten it or \
                          switch to a model with a larger context window."
                    .to_string(),
            }
        } else if utilization >= self.thresholds.truncate {
            warnings.push(TokenWarning {
                level: WarnLevel::Critical,
                message: format!(
                    "context window {:.0}% full; older messages will be trimmed",
                    utilization * 100.0
                ),
            });
            Recommendation {
                action: BudgetAction::Truncate,
                message: "Conversation history exceeds the context budget and will be trimmed."
                    .to_string(),
            }
        } else if utilization >= self.thresholds.warn {
            warnings.push(TokenWarning {
                level: WarnLevel::Warn,
                message: format!("context window {:.0}% full", utilization * 100.0),
            });
            Recommendation {
                action: BudgetAction::WarnUser,
                message: "This conversation is getting long; older context may be dropped soon."
                    .to_string(),
            }
        } else {
            if utilization >= INFO_THRESHOLD {
                warnings.push(TokenWarning {
                    level: WarnLevel::Info,
                    message: format!("context window {:.0}% full", utilization * 100.0),
                });
            }
            Recommendation {
                action: BudgetAction::Ok,
                message: String::new(),
            }
        };

        debug!(
            model,
            total_tokens,
            context_window,
            utilization = format!("{utilization:.3}"),
            action = ?recommendation.action,
            "accounted request"
        );

        TokenInfo {
            message_tokens,
            system_prompt_tokens,
            rag_context_tokens,
            tool_schema_tokens,
            total_tokens,
            context_window,
            utilization,
            warnings,
            recommendation,
        }
    }

    /// The part of a request truncation can never remove: the system prompt
    /// and the newest user message with framing.
    fn floor_tokens(&self, model: &str, parts: RequestParts<'_>) -> u32 {
        let last_user = parts
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| self.estimator.estimate_messages(model, std::slice::from_ref(m)))
            .unwrap_or(0);
        self.estimator.estimate_text(model, parts.system_prompt) + last_user
    }
}
