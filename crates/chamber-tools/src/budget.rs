// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-turn time budget shared by every function call in a turn.

use std::time::Duration;

use tokio::time::Instant;

/// Wall-clock allowance for one user turn.
pub const TURN_LIMIT: Duration = Duration::from_secs(60);

/// No single function call may run longer than this.
const CALL_CAP: Duration = Duration::from_secs(30);

/// Every attempted call gets at least this long, even near the end of the
/// budget.
const CALL_FLOOR: Duration = Duration::from_secs(5);

/// Tracks how much of the turn allowance is left.
///
/// The budget is started once per turn and consulted before each function
/// call and each ladder level. It never stops anything by itself: callers
/// wrap work in `tokio::time::timeout` with the value from [`call_timeout`].
///
/// [`call_timeout`]: TurnBudget::call_timeout
#[derive(Debug, Clone)]
pub struct TurnBudget {
    started: Instant,
    limit: Duration,
    call_cap: Duration,
    call_floor: Duration,
}

impl TurnBudget {
    /// Starts a fresh budget with the standard turn allowance.
    pub fn start() -> Self {
        Self::with_limit(TURN_LIMIT)
    }

    /// Starts a budget with a custom allowance.
    pub fn with_limit(limit: Duration) -> Self {
        Self::with_settings(limit, CALL_CAP, CALL_FLOOR)
    }

    /// Starts a budget with the allowance and per-call bounds all configured.
    pub fn with_settings(limit: Duration, call_cap: Duration, call_floor: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
            call_cap,
            call_floor,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Timeout for the next function call: the remaining budget, capped at
    /// 30 s and floored at 5 s. `None` once the budget is spent, which tells
    /// the caller to skip pending work entirely.
    pub fn call_timeout(&self) -> Option<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return None;
        }
        Some(remaining.clamp(self.call_floor, self.call_cap))
    }
}
