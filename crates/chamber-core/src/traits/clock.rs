// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wall-clock capability, injectable for deterministic tests.

use chrono::{DateTime, SecondsFormat, Utc};

/// Source of the current time.
///
/// Timestamps persisted by the engine are RFC 3339 with millisecond
/// precision, always UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_rfc3339(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_renders_utc_rfc3339() {
        let stamp = SystemClock.now_rfc3339();
        assert!(stamp.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&stamp).is_ok());
    }
}
