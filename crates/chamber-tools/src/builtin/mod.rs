// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in statistics functions over the local streaming history.
//!
//! These are thin wrappers around the `chamber-query` aggregations. Each one
//! returns a JSON fact block for the model plus a natural-language rendering
//! for replies produced without a second model call.

pub mod artist;
pub mod compare;
pub mod period;

pub use artist::ArtistStatsFn;
pub use compare::ComparePeriodsFn;
pub use period::{HoursInPeriodFn, PeriodSummaryFn, TopArtistFn, TopTracksFn};

use std::sync::Arc;

use chamber_query::Period;
use serde_json::Value;

use crate::ToolRegistry;

/// Registers all built-in functions into the given registry.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(HoursInPeriodFn));
    registry.register(Arc::new(PeriodSummaryFn));
    registry.register(Arc::new(TopArtistFn));
    registry.register(Arc::new(TopTracksFn));
    registry.register(Arc::new(ArtistStatsFn));
    registry.register(Arc::new(ComparePeriodsFn));
}

/// Hours rounded the way they are shown to the user.
pub(crate) fn round_hours(hours: f64) -> f64 {
    (hours * 10.0).round() / 10.0
}

pub(crate) fn arg_year(args: &Value, key: &str) -> Option<i32> {
    args.get(key).and_then(Value::as_i64).map(|y| y as i32)
}

pub(crate) fn arg_month(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_i64)
}

pub(crate) fn arg_count(args: &Value, default: usize) -> usize {
    args.get("count")
        .and_then(Value::as_u64)
        .map(|c| c as usize)
        .filter(|&c| c > 0)
        .unwrap_or(default)
}

/// Builds the calendar period described by `year`/`month` arguments.
///
/// `Ok(None)` means no year was supplied at all; an unusable year or month
/// is an argument error.
pub(crate) fn period_from_args(
    args: &Value,
    year_key: &str,
    month_key: &str,
) -> Result<Option<Period>, String> {
    let Some(year) = arg_year(args, year_key) else {
        if args.get(month_key).is_some() {
            return Err(format!("`{month_key}` requires `{year_key}` as well"));
        }
        return Ok(None);
    };
    match arg_month(args, month_key) {
        None => Period::year(year)
            .map(Some)
            .ok_or_else(|| format!("{year} is not a usable year")),
        Some(month) => u32::try_from(month)
            .ok()
            .and_then(|m| Period::month(year, m))
            .map(Some)
            .ok_or_else(|| format!("{month} is not a calendar month")),
    }
}

/// The `year`/`month` argument object describing a calendar period.
///
/// Periods produced by the query patterns are whole calendar months or whole
/// calendar years, so a span of a month or less means a month period.
pub(crate) fn period_args(period: &Period) -> Value {
    use chrono::Datelike;
    let mut args = serde_json::Map::new();
    args.insert("year".into(), period.start.year().into());
    if period.end - period.start <= chrono::Duration::days(31) {
        args.insert("month".into(), period.start.month().into());
    }
    Value::Object(args)
}
