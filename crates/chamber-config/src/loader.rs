// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chamber.toml` > `~/.config/rhythm-chamber/chamber.toml`
//! > `/etc/rhythm-chamber/chamber.toml` with environment variable overrides
//! via `CHAMBER_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChamberConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/rhythm-chamber/chamber.toml` (system-wide)
/// 3. `~/.config/rhythm-chamber/chamber.toml` (user XDG config)
/// 4. `./chamber.toml` (local directory)
/// 5. `CHAMBER_*` environment variables
pub fn load_config() -> Result<ChamberConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChamberConfig::default()))
        .merge(Toml::file("/etc/rhythm-chamber/chamber.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("rhythm-chamber/chamber.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chamber.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and embedded configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ChamberConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChamberConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChamberConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChamberConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CHAMBER_SESSION_SAVE_DEBOUNCE_MS` must
/// map to `session.save_debounce_ms`, not `session.save.debounce.ms`. The
/// provider sections nest one level deeper (`providers.cloud.api_key`), so
/// backend names are mapped after the section prefix.
fn env_provider() -> Env {
    Env::prefixed("CHAMBER_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: CHAMBER_PROVIDERS_CLOUD_API_KEY -> "providers_cloud_api_key"
        let mapped = key
            .as_str()
            .replacen("engine_", "engine.", 1)
            .replacen("providers_", "providers.", 1)
            .replacen("tokens_", "tokens.", 1)
            .replacen("session_", "session.", 1)
            .replacen("license_", "license.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("prompt_", "prompt.", 1);
        let mapped = if let Some(rest) = mapped.strip_prefix("providers.") {
            let nested = rest
                .replacen("cloud_", "cloud.", 1)
                .replacen("ollama_", "ollama.", 1)
                .replacen("lmstudio_", "lmstudio.", 1);
            format!("providers.{nested}")
        } else {
            mapped
        };
        mapped.into()
    })
}
