// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Whole-history facts about a single artist.

use async_trait::async_trait;
use chamber_core::ChamberError;
use chamber_query::artist_stats;
use serde_json::json;

use crate::builtin::round_hours;
use crate::tool::{ToolContext, ToolFn, ToolOutput};

pub struct ArtistStatsFn;

#[async_trait]
impl ToolFn for ArtistStatsFn {
    fn name(&self) -> &str {
        "artistStats"
    }

    fn description(&self) -> &str {
        "Plays, hours, first and last listen, and monthly breakdown for one artist"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "artist": {
                    "type": "string",
                    "description": "Artist name, matched case-insensitively"
                }
            },
            "required": ["artist"]
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ChamberError> {
        let Some(artist) = args
            .get("artist")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
        else {
            return Ok(ToolOutput::error("the `artist` argument is required"));
        };

        let Some(stats) = artist_stats(&context.records, artist) else {
            // An unknown artist is an answer, not a failure.
            return Ok(ToolOutput::ok(
                json!({"artist": artist, "plays": 0}).to_string(),
                format!("No plays recorded for {artist}."),
            ));
        };

        let monthly: Vec<serde_json::Value> = stats
            .monthly
            .iter()
            .map(|(&(year, month), &plays)| {
                json!({"year": year, "month": month, "plays": plays})
            })
            .collect();
        let content = json!({
            "artist": stats.artist,
            "plays": stats.plays,
            "hours": round_hours(stats.hours),
            "first_listen": stats.first_listen.format("%Y-%m-%d").to_string(),
            "last_listen": stats.last_listen.format("%Y-%m-%d").to_string(),
            "peak_month": {
                "year": stats.peak_month.0,
                "month": stats.peak_month.1,
                "plays": stats.peak_month.2,
            },
            "monthly": monthly,
        });
        Ok(ToolOutput::ok(content.to_string(), stats.render()))
    }
}
