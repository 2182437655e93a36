// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Category detection over one user message plus the local dataset.

use chrono::{DateTime, Utc};
use tracing::debug;

use chamber_core::StreamRecord;

use crate::patterns::{self, Period};
use crate::stats;

/// Top-list length for period and comparison renderings.
const PERIOD_TOP_N: usize = 5;

/// Top-list length for all-time superlative renderings.
const ALL_TIME_TOP_N: usize = 10;

/// How a recognized message maps onto deterministic stats.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedQuery {
    Period { period: Period },
    Artist { artist: String },
    Comparison { first: Period, second: Period },
    TopAllTime,
}

/// Deterministic facts extracted for one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryContext {
    pub query: ParsedQuery,
    /// Compact fact block for prompt assembly and direct replies.
    pub summary: String,
}

/// Extract deterministic facts for `message`, or `None` when no category
/// matches or there is no data to draw facts from.
///
/// Precedence: comparison, then artist, then all-time superlative, then
/// period. Artist candidates only count when they name an artist that
/// actually occurs in `records`.
pub fn extract_query_context(
    message: &str,
    records: &[StreamRecord],
    now: DateTime<Utc>,
) -> Option<QueryContext> {
    if records.is_empty() {
        return None;
    }

    if patterns::has_comparison_marker(message) {
        let years = patterns::find_years(message);
        if years.len() >= 2 {
            let first = Period::year(years[0])?;
            let second = Period::year(years[1])?;
            let comparison = stats::compare_periods(records, &first, &second, PERIOD_TOP_N);
            debug!(first = %first.label, second = %second.label, "query context: comparison");
            return Some(QueryContext {
                summary: comparison.render(),
                query: ParsedQuery::Comparison { first, second },
            });
        }
    }

    // Month names stripped so "March 2023" never reads as an artist.
    let cleaned = patterns::strip_month_year(message);
    let index = stats::artist_index(records);
    for candidate in patterns::artist_candidates(&cleaned) {
        let key = candidate.to_lowercase();
        let display = match index.get(&key) {
            Some(display) => Some(display),
            None => {
                let trimmed = key.trim_end_matches([',', '.', '?', '!', ';', ':']);
                if trimmed.len() == key.len() {
                    None
                } else {
                    index.get(trimmed)
                }
            }
        };
        if let Some(display) = display {
            if let Some(artist) = stats::artist_stats(records, display) {
                debug!(artist = %artist.artist, "query context: artist");
                return Some(QueryContext {
                    summary: artist.render(),
                    query: ParsedQuery::Artist {
                        artist: artist.artist.clone(),
                    },
                });
            }
        }
    }

    if patterns::has_all_time_superlative(message) {
        let period = stats::dataset_period(records)?;
        let top = stats::period_stats(records, &period, ALL_TIME_TOP_N);
        debug!("query context: all-time top");
        return Some(QueryContext {
            summary: top.render(),
            query: ParsedQuery::TopAllTime,
        });
    }

    if let Some(period) = patterns::find_period(message, now) {
        let stats = stats::period_stats(records, &period, PERIOD_TOP_N);
        debug!(period = %period.label, "query context: period");
        return Some(QueryContext {
            summary: stats.render(),
            query: ParsedQuery::Period { period },
        });
    }

    debug!("query context: no category matched");
    None
}
