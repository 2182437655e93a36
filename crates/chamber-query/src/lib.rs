// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic query-context extraction over local streaming history.
//!
//! Recognizes date/period, artist, comparison and all-time superlative
//! questions, computes the matching aggregates from the stream records and
//! renders a compact fact block. No model involvement anywhere: the same
//! renderings back both prompt context and direct tool replies.

mod extractor;
mod patterns;
mod stats;

pub use extractor::{ParsedQuery, QueryContext, extract_query_context};
pub use patterns::{Period, find_period, find_years};
pub use stats::{
    ArtistStats, ComparisonStats, MonthlyPlays, PeriodStats, artist_index, artist_stats,
    compare_periods, dataset_period, listener_profile, period_stats,
};
