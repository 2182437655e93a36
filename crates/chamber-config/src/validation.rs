// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as threshold ordering, non-zero budgets, and non-empty
//! endpoints.

use crate::diagnostic::ConfigError;
use crate::model::ChamberConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ChamberConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let mut require = |ok: bool, message: String| {
        if !ok {
            errors.push(ConfigError::Validation { message });
        }
    };

    require(
        config.engine.turn_budget_secs > 0,
        "engine.turn_budget_secs must be positive".to_string(),
    );
    require(
        config.engine.tool_call_timeout_secs > 0,
        "engine.tool_call_timeout_secs must be positive".to_string(),
    );
    require(
        config.engine.min_tool_call_secs <= config.engine.tool_call_timeout_secs,
        format!(
            "engine.min_tool_call_secs ({}) must not exceed engine.tool_call_timeout_secs ({})",
            config.engine.min_tool_call_secs, config.engine.tool_call_timeout_secs
        ),
    );
    require(
        config.engine.breaker_threshold >= 1,
        "engine.breaker_threshold must be at least 1".to_string(),
    );

    require(
        !config.providers.cloud.api_url.trim().is_empty(),
        "providers.cloud.api_url must not be empty".to_string(),
    );
    require(
        !config.providers.ollama.endpoint.trim().is_empty(),
        "providers.ollama.endpoint must not be empty".to_string(),
    );
    require(
        !config.providers.lmstudio.endpoint.trim().is_empty(),
        "providers.lmstudio.endpoint must not be empty".to_string(),
    );
    for (section, window) in [
        ("providers.cloud", config.providers.cloud.context_window),
        ("providers.ollama", config.providers.ollama.context_window),
        ("providers.lmstudio", config.providers.lmstudio.context_window),
    ] {
        require(
            window > 0,
            format!("{section}.context_window must be positive"),
        );
    }

    require(
        config.tokens.default_chars_per_token > 0.0,
        format!(
            "tokens.default_chars_per_token must be positive, got {}",
            config.tokens.default_chars_per_token
        ),
    );
    for (family, ratio) in &config.tokens.chars_per_token {
        require(
            *ratio > 0.0,
            format!("tokens.chars_per_token.{family} must be positive, got {ratio}"),
        );
    }
    for (name, value) in [
        ("tokens.warn_threshold", config.tokens.warn_threshold),
        ("tokens.truncate_threshold", config.tokens.truncate_threshold),
        (
            "tokens.truncate_target_ratio",
            config.tokens.truncate_target_ratio,
        ),
    ] {
        require(
            value > 0.0 && value <= 1.0,
            format!("{name} must be in (0, 1], got {value}"),
        );
    }
    require(
        config.tokens.warn_threshold <= config.tokens.truncate_threshold,
        format!(
            "tokens.warn_threshold ({}) must not exceed tokens.truncate_threshold ({})",
            config.tokens.warn_threshold, config.tokens.truncate_threshold
        ),
    );

    require(
        config.session.immediate_save_message_cap > 0,
        "session.immediate_save_message_cap must be positive".to_string(),
    );

    require(
        !config.license.server_url.trim().is_empty(),
        "license.server_url must not be empty".to_string(),
    );
    require(
        config.license.timeout_secs > 0,
        "license.timeout_secs must be positive".to_string(),
    );

    require(
        !config.storage.database_path.trim().is_empty(),
        "storage.database_path must not be empty".to_string(),
    );
    require(
        !config.storage.kv_path.trim().is_empty(),
        "storage.kv_path must not be empty".to_string(),
    );

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
