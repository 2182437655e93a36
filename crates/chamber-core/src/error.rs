// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Rhythm Chamber turn engine.

use thiserror::Error;

/// The primary error type used across all Rhythm Chamber crates and core operations.
#[derive(Debug, Error)]
pub enum ChamberError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM provider errors (API failure, malformed response, unreachable endpoint).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// License verification errors (bad signature, expired token, server rejection).
    #[error("license error: {0}")]
    License(String),

    /// A registered function failed during invocation.
    #[error("tool `{name}` failed: {message}")]
    Tool { name: String, message: String },

    /// The model requested a function that is not in the registry.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The turn was cancelled before a reply was produced.
    #[error("turn cancelled")]
    Cancelled,

    /// The per-turn time budget ran out mid-flight.
    #[error("turn budget exhausted")]
    BudgetExhausted,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
