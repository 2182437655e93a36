// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Period-scoped functions: listening hours, summaries, and top lists.

use async_trait::async_trait;
use chamber_core::ChamberError;
use chamber_query::{Period, PeriodStats, dataset_period, period_stats};
use serde_json::json;

use crate::builtin::{arg_count, period_from_args, round_hours};
use crate::tool::{ToolContext, ToolFn, ToolOutput};

/// Top-list length used when none is requested.
const SUMMARY_TOP_N: usize = 5;

/// JSON fact block for one period's aggregates.
pub(crate) fn period_stats_json(stats: &PeriodStats) -> serde_json::Value {
    json!({
        "period": stats.label,
        "plays": stats.plays,
        "hours": round_hours(stats.hours),
        "unique_artists": stats.unique_artists,
        "unique_tracks": stats.unique_tracks,
        "top_artists": stats
            .top_artists
            .iter()
            .map(|(artist, plays)| json!({"artist": artist, "plays": plays}))
            .collect::<Vec<_>>(),
        "top_tracks": stats
            .top_tracks
            .iter()
            .map(|(track, artist, plays)| {
                json!({"track": track, "artist": artist, "plays": plays})
            })
            .collect::<Vec<_>>(),
    })
}

/// Resolves the optional `year`/`month` arguments, falling back to the whole
/// dataset when no year is given.
fn period_or_dataset(
    args: &serde_json::Value,
    context: &ToolContext,
) -> Result<Period, ToolOutput> {
    match period_from_args(args, "year", "month") {
        Err(message) => Err(ToolOutput::error(message)),
        Ok(Some(period)) => Ok(period),
        Ok(None) => dataset_period(&context.records)
            .ok_or_else(|| ToolOutput::error("no listening history is loaded")),
    }
}

/// Total listening hours within one calendar period.
pub struct HoursInPeriodFn;

#[async_trait]
impl ToolFn for HoursInPeriodFn {
    fn name(&self) -> &str {
        "hoursInPeriod"
    }

    fn description(&self) -> &str {
        "Total listening hours in a calendar year or month"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "year": {
                    "type": "integer",
                    "description": "Calendar year, e.g. 2021"
                },
                "month": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 12,
                    "description": "Calendar month 1-12; omit for the whole year"
                }
            },
            "required": ["year"]
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ChamberError> {
        let period = match period_from_args(&args, "year", "month") {
            Err(message) => return Ok(ToolOutput::error(message)),
            Ok(None) => return Ok(ToolOutput::error("the `year` argument is required")),
            Ok(Some(period)) => period,
        };
        let stats = period_stats(&context.records, &period, 0);
        let hours = round_hours(stats.hours);
        let rendered = if stats.plays == 0 {
            format!("No listening recorded for {}.", stats.label)
        } else {
            format!("You listened for {hours} hours in {}.", stats.label)
        };
        Ok(ToolOutput::ok(
            json!({"period": stats.label, "hours": hours, "plays": stats.plays}).to_string(),
            rendered,
        ))
    }
}

/// Full aggregate summary for one calendar period.
pub struct PeriodSummaryFn;

#[async_trait]
impl ToolFn for PeriodSummaryFn {
    fn name(&self) -> &str {
        "periodSummary"
    }

    fn description(&self) -> &str {
        "Plays, hours, unique counts, and top lists for a calendar year or month"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "year": {
                    "type": "integer",
                    "description": "Calendar year, e.g. 2021"
                },
                "month": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 12,
                    "description": "Calendar month 1-12; omit for the whole year"
                }
            },
            "required": ["year"]
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ChamberError> {
        let period = match period_from_args(&args, "year", "month") {
            Err(message) => return Ok(ToolOutput::error(message)),
            Ok(None) => return Ok(ToolOutput::error("the `year` argument is required")),
            Ok(Some(period)) => period,
        };
        let stats = period_stats(&context.records, &period, SUMMARY_TOP_N);
        Ok(ToolOutput::ok(
            period_stats_json(&stats).to_string(),
            stats.render(),
        ))
    }
}

/// Most played artist, for one period or the whole history.
pub struct TopArtistFn;

#[async_trait]
impl ToolFn for TopArtistFn {
    fn name(&self) -> &str {
        "topArtist"
    }

    fn description(&self) -> &str {
        "Most played artists, optionally limited to a calendar year or month"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "year": {
                    "type": "integer",
                    "description": "Calendar year; omit for all time"
                },
                "month": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 12,
                    "description": "Calendar month 1-12"
                },
                "count": {
                    "type": "integer",
                    "minimum": 1,
                    "default": 1,
                    "description": "How many artists to return"
                }
            }
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ChamberError> {
        let period = match period_or_dataset(&args, context) {
            Ok(period) => period,
            Err(output) => return Ok(output),
        };
        let count = arg_count(&args, 1);
        let stats = period_stats(&context.records, &period, count);
        let content = json!({
            "period": stats.label,
            "artists": stats
                .top_artists
                .iter()
                .map(|(artist, plays)| json!({"artist": artist, "plays": plays}))
                .collect::<Vec<_>>(),
        });
        let rendered = render_top_artists(&stats);
        Ok(ToolOutput::ok(content.to_string(), rendered))
    }
}

fn render_top_artists(stats: &PeriodStats) -> String {
    match stats.top_artists.as_slice() {
        [] => format!("No listening recorded for {}.", stats.label),
        [(artist, plays)] if stats.label == "all time" => {
            format!("Your all-time top artist is {artist} with {plays} plays.")
        }
        [(artist, plays)] => {
            format!(
                "Your top artist for {} is {artist} with {plays} plays.",
                stats.label
            )
        }
        artists => {
            let list = artists
                .iter()
                .map(|(artist, plays)| format!("{artist} ({plays})"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Top artists for {}: {list}.", stats.label)
        }
    }
}

/// Most played tracks, for one period or the whole history.
pub struct TopTracksFn;

#[async_trait]
impl ToolFn for TopTracksFn {
    fn name(&self) -> &str {
        "topTracks"
    }

    fn description(&self) -> &str {
        "Most played tracks, optionally limited to a calendar year or month"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "year": {
                    "type": "integer",
                    "description": "Calendar year; omit for all time"
                },
                "month": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 12,
                    "description": "Calendar month 1-12"
                },
                "count": {
                    "type": "integer",
                    "minimum": 1,
                    "default": 5,
                    "description": "How many tracks to return"
                }
            }
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ChamberError> {
        let period = match period_or_dataset(&args, context) {
            Ok(period) => period,
            Err(output) => return Ok(output),
        };
        let count = arg_count(&args, 5);
        let stats = period_stats(&context.records, &period, count);
        let content = json!({
            "period": stats.label,
            "tracks": stats
                .top_tracks
                .iter()
                .map(|(track, artist, plays)| {
                    json!({"track": track, "artist": artist, "plays": plays})
                })
                .collect::<Vec<_>>(),
        });
        let rendered = if stats.top_tracks.is_empty() {
            format!("No listening recorded for {}.", stats.label)
        } else {
            let list = stats
                .top_tracks
                .iter()
                .map(|(track, artist, plays)| format!("\"{track}\" by {artist} ({plays})"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Top tracks for {}: {list}.", stats.label)
        };
        Ok(ToolOutput::ok(content.to_string(), rendered))
    }
}
