// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Function trait and registry for the built-in statistics tools.
//!
//! The [`ToolFn`] trait defines the interface every callable function
//! implements. The [`ToolRegistry`] manages lookup by name and generates
//! OpenAI-format tool definitions for the provider request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chamber_core::{ChamberError, StreamRecord, ToolSpec};
use chrono::{DateTime, Utc};

/// Output from one function invocation.
///
/// `content` is what gets fed back to the model as a tool message, always a
/// JSON document. `rendered` is an optional natural-language version of the
/// same facts, used verbatim when the reply is produced without a second
/// model call.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub rendered: Option<String>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>, rendered: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            rendered: Some(rendered.into()),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            content: serde_json::json!({ "error": message }).to_string(),
            rendered: Some(message),
            is_error: true,
        }
    }
}

/// Read-only data the functions compute over.
///
/// Cloning is cheap: the record slice is shared, not copied.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub records: Arc<Vec<StreamRecord>>,
    pub now: DateTime<Utc>,
}

impl ToolContext {
    pub fn new(records: Arc<Vec<StreamRecord>>, now: DateTime<Utc>) -> Self {
        Self { records, now }
    }
}

/// Unified trait for all callable functions.
///
/// Every function provides a name, description, JSON Schema for its
/// parameters, and an async `invoke` method. The orchestrator calls `invoke`
/// with the parsed JSON arguments from the model's tool call.
#[async_trait]
pub trait ToolFn: Send + Sync {
    /// Returns the function's unique name (used for lookup and API serialization).
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the function does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema describing the function's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Invokes the function with the given JSON arguments.
    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ChamberError>;
}

/// Registry of available functions, indexed by name.
///
/// The registry provides lookup for the orchestrator and generates the
/// OpenAI-format tool definition array advertised on provider requests.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolFn>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers a function. The function is indexed by its `name()`.
    pub fn register(&mut self, tool: Arc<dyn ToolFn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Looks up a function by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolFn>> {
        self.tools.get(name).cloned()
    }

    /// Returns (name, description) pairs for all registered functions.
    pub fn list(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }

    /// Returns OpenAI-format tool definitions for all registered functions,
    /// sorted by name so the advertised order is stable.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|t| ToolSpec::function(t.name(), t.description(), t.parameters_schema()))
            .collect();
        specs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        specs
    }

    /// Returns the number of registered functions.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if no functions are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
