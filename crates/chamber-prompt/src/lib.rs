// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt assembly for the turn engine.
//!
//! The templated base prompt never shrinks; retrieved listening context and
//! deterministic query facts are appended only while the context budget
//! allows, with retrieved context following an all-or-half rule.

mod builder;
mod template;

pub use builder::{BuiltPrompt, PromptBuilder, RagDisposition};
pub use template::{DEFAULT_TEMPLATE, PromptInputs, PromptTemplate};
