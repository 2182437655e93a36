// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-turn circuit breaker over function names.

use std::collections::HashMap;

use tracing::warn;

/// Consecutive failures after which a function is skipped for the rest of
/// the turn.
pub const BREAK_THRESHOLD: u32 = 3;

/// Tracks consecutive invocation failures per function name.
///
/// A breaker lives for exactly one user turn: the orchestrator constructs a
/// fresh one at turn start, so nothing ever persists across turns. A success
/// resets the count for that function.
#[derive(Debug)]
pub struct CircuitBreaker {
    failures: HashMap<String, u32>,
    threshold: u32,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_threshold(BREAK_THRESHOLD)
    }

    /// A breaker that opens after `threshold` consecutive failures instead
    /// of the default.
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            failures: HashMap::new(),
            threshold: threshold.max(1),
        }
    }

    /// Records a failed invocation. Returns true when this failure opened
    /// the circuit for `name`.
    pub fn record_failure(&mut self, name: &str) -> bool {
        let count = self.failures.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count == self.threshold {
            warn!(function = name, failures = *count, "circuit opened for function");
            true
        } else {
            false
        }
    }

    /// Records a successful invocation, resetting the consecutive count.
    pub fn record_success(&mut self, name: &str) {
        self.failures.remove(name);
    }

    /// True when `name` has failed enough times to be skipped this turn.
    pub fn is_open(&self, name: &str) -> bool {
        self.failures
            .get(name)
            .is_some_and(|&count| count >= self.threshold)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
