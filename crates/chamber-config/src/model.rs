// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Rhythm Chamber turn engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use chamber_core::ProviderKind;

/// Top-level Rhythm Chamber configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChamberConfig {
    /// Turn orchestration settings (budgets, breaker, queue).
    #[serde(default)]
    pub engine: EngineConfig,

    /// Provider backend settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Token estimation and context budget settings.
    #[serde(default)]
    pub tokens: TokensConfig,

    /// Session persistence settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// License verification settings.
    #[serde(default)]
    pub license: LicenseConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// System prompt settings.
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Turn orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Wall-clock budget for one full turn, in seconds.
    #[serde(default = "default_turn_budget_secs")]
    pub turn_budget_secs: u64,

    /// Timeout for a single function invocation, in seconds.
    #[serde(default = "default_tool_call_timeout_secs")]
    pub tool_call_timeout_secs: u64,

    /// Minimum remaining budget required to start another function call.
    #[serde(default = "default_min_tool_call_secs")]
    pub min_tool_call_secs: u64,

    /// Consecutive failures after which a function is skipped for the
    /// rest of the turn.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            turn_budget_secs: default_turn_budget_secs(),
            tool_call_timeout_secs: default_tool_call_timeout_secs(),
            min_tool_call_secs: default_min_tool_call_secs(),
            breaker_threshold: default_breaker_threshold(),
        }
    }
}

fn default_turn_budget_secs() -> u64 {
    60
}

fn default_tool_call_timeout_secs() -> u64 {
    30
}

fn default_min_tool_call_secs() -> u64 {
    5
}

fn default_breaker_threshold() -> u32 {
    3
}

/// Provider backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Which backend drives turns.
    #[serde(default = "default_active_provider")]
    pub active: ProviderKind,

    #[serde(default)]
    pub cloud: CloudConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub lmstudio: LmStudioConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            active: default_active_provider(),
            cloud: CloudConfig::default(),
            ollama: OllamaConfig::default(),
            lmstudio: LmStudioConfig::default(),
        }
    }
}

fn default_active_provider() -> ProviderKind {
    ProviderKind::Ollama
}

/// Hosted cloud backend (OpenRouter-compatible chat completions).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CloudConfig {
    /// Full chat-completions URL.
    #[serde(default = "default_cloud_api_url")]
    pub api_url: String,

    /// Bearer token. `None` means cloud turns get a canned reply instead
    /// of a request.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_cloud_model")]
    pub model: String,

    /// Context window of the configured model, in tokens.
    #[serde(default = "default_cloud_context_window")]
    pub context_window: u32,

    /// Reply length cap sent in the request body.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Optional attribution headers some gateways use for rankings.
    #[serde(default)]
    pub referer: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_cloud_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_url: default_cloud_api_url(),
            api_key: None,
            model: default_cloud_model(),
            context_window: default_cloud_context_window(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            referer: None,
            title: None,
            timeout_secs: default_cloud_timeout_secs(),
        }
    }
}

fn default_cloud_api_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_cloud_model() -> String {
    "openrouter/auto".to_string()
}

fn default_cloud_context_window() -> u32 {
    128_000
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.7
}

fn default_cloud_timeout_secs() -> u64 {
    60
}

/// Local Ollama daemon backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaConfig {
    /// Base URL of the daemon; `/api/chat` is appended.
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,

    #[serde(default = "default_local_context_window")]
    pub context_window: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Request timeout in seconds.
    #[serde(default = "default_local_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_ollama_model(),
            context_window: default_local_context_window(),
            temperature: default_temperature(),
            timeout_secs: default_local_timeout_secs(),
        }
    }
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1".to_string()
}

fn default_local_context_window() -> u32 {
    8192
}

fn default_local_timeout_secs() -> u64 {
    90
}

/// Local OpenAI-compatible backend (LM Studio and friends).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LmStudioConfig {
    /// Base URL of the server; `/v1/chat/completions` is appended.
    #[serde(default = "default_lmstudio_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_lmstudio_model")]
    pub model: String,

    #[serde(default = "default_local_context_window")]
    pub context_window: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Request timeout in seconds.
    #[serde(default = "default_local_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LmStudioConfig {
    fn default() -> Self {
        Self {
            endpoint: default_lmstudio_endpoint(),
            model: default_lmstudio_model(),
            context_window: default_local_context_window(),
            temperature: default_temperature(),
            timeout_secs: default_local_timeout_secs(),
        }
    }
}

fn default_lmstudio_endpoint() -> String {
    "http://localhost:1234".to_string()
}

fn default_lmstudio_model() -> String {
    "local-model".to_string()
}

/// Token estimation and context budget configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TokensConfig {
    /// Fallback characters-per-token ratio for unknown model families.
    #[serde(default = "default_chars_per_token")]
    pub default_chars_per_token: f64,

    /// Per-family ratio overrides, keyed by model-name substring.
    #[serde(default)]
    pub chars_per_token: HashMap<String, f64>,

    /// Utilization at which the user is warned about a shrinking context.
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: f64,

    /// Utilization at which history truncation is required.
    #[serde(default = "default_truncate_threshold")]
    pub truncate_threshold: f64,

    /// Truncation aims at this fraction of the context window.
    #[serde(default = "default_truncate_target_ratio")]
    pub truncate_target_ratio: f64,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            default_chars_per_token: default_chars_per_token(),
            chars_per_token: HashMap::new(),
            warn_threshold: default_warn_threshold(),
            truncate_threshold: default_truncate_threshold(),
            truncate_target_ratio: default_truncate_target_ratio(),
        }
    }
}

fn default_chars_per_token() -> f64 {
    4.0
}

fn default_warn_threshold() -> f64 {
    0.85
}

fn default_truncate_threshold() -> f64 {
    0.95
}

fn default_truncate_target_ratio() -> f64 {
    0.9
}

/// Session persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Debounce interval for background saves, in milliseconds.
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Durable writes and emergency snapshots keep at most this many
    /// trailing messages.
    #[serde(default = "default_immediate_save_cap")]
    pub immediate_save_message_cap: usize,

    /// Emergency snapshots older than this are ignored at boot, in seconds.
    #[serde(default = "default_recovery_max_age_secs")]
    pub recovery_max_age_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: default_save_debounce_ms(),
            immediate_save_message_cap: default_immediate_save_cap(),
            recovery_max_age_secs: default_recovery_max_age_secs(),
        }
    }
}

fn default_save_debounce_ms() -> u64 {
    2000
}

fn default_immediate_save_cap() -> usize {
    100
}

fn default_recovery_max_age_secs() -> u64 {
    3600
}

/// License verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseConfig {
    /// Base URL of the license server; `/api/license/verify` is appended.
    #[serde(default = "default_license_server_url")]
    pub server_url: String,

    /// Verification request timeout in seconds.
    #[serde(default = "default_license_timeout_secs")]
    pub timeout_secs: u64,

    /// How long a successful verification is memoized, in seconds.
    #[serde(default = "default_license_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            server_url: default_license_server_url(),
            timeout_secs: default_license_timeout_secs(),
            cache_ttl_secs: default_license_cache_ttl_secs(),
        }
    }
}

fn default_license_server_url() -> String {
    "https://api.rhythmchamber.app".to_string()
}

fn default_license_timeout_secs() -> u64 {
    10
}

fn default_license_cache_ttl_secs() -> u64 {
    86_400
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Directory backing the synchronous key-value store.
    #[serde(default = "default_kv_path")]
    pub kv_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            kv_path: default_kv_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("rhythm-chamber").join("chamber.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chamber.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_kv_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("rhythm-chamber").join("kv"))
        .unwrap_or_else(|| std::path::PathBuf::from("kv"))
        .to_string_lossy()
        .into_owned()
}

/// System prompt configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    /// Inline template overriding the built-in system prompt.
    /// Placeholders: `{personality}`, `{evidence}`, `{insights}`,
    /// `{date_range}`, `{today}`.
    #[serde(default)]
    pub template: Option<String>,

    /// Path to a file containing the template. Takes precedence over
    /// `template` if both are set.
    #[serde(default)]
    pub template_file: Option<String>,
}
