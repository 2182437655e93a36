// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Function-calling orchestration over the local listening history.
//!
//! A [`ToolRegistry`] of [`ToolFn`] implementations is advertised to the
//! model; the [`ToolOrchestrator`] resolves whatever the model sends back
//! through a four-level ladder, guarded by a per-turn [`TurnBudget`] and a
//! per-function [`CircuitBreaker`]. The built-in catalog wraps the
//! `chamber-query` aggregations.

pub mod breaker;
pub mod budget;
pub mod builtin;
pub mod intent;
pub mod ladder;
pub mod tool;

pub use breaker::{BREAK_THRESHOLD, CircuitBreaker};
pub use budget::{TURN_LIMIT, TurnBudget};
pub use builtin::register_builtins;
pub use intent::{Intent, classify};
pub use ladder::{LadderOutcome, ReplySource, ToolOrchestrator};
pub use tool::{ToolContext, ToolFn, ToolOutput, ToolRegistry};
