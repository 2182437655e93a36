// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Side-by-side comparison of two calendar periods.

use async_trait::async_trait;
use chamber_core::ChamberError;
use chamber_query::compare_periods;
use serde_json::json;

use crate::builtin::period::period_stats_json;
use crate::builtin::period_from_args;
use crate::tool::{ToolContext, ToolFn, ToolOutput};

/// Top-list length carried inside each side of the comparison.
const COMPARE_TOP_N: usize = 5;

pub struct ComparePeriodsFn;

#[async_trait]
impl ToolFn for ComparePeriodsFn {
    fn name(&self) -> &str {
        "comparePeriods"
    }

    fn description(&self) -> &str {
        "Compare two calendar periods, including artists gained and dropped"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "first_year": {
                    "type": "integer",
                    "description": "Year of the first period"
                },
                "first_month": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 12,
                    "description": "Month of the first period; omit for the whole year"
                },
                "second_year": {
                    "type": "integer",
                    "description": "Year of the second period"
                },
                "second_month": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 12,
                    "description": "Month of the second period; omit for the whole year"
                }
            },
            "required": ["first_year", "second_year"]
        })
    }

    async fn invoke(
        &self,
        args: serde_json::Value,
        context: &ToolContext,
    ) -> Result<ToolOutput, ChamberError> {
        let first = match period_from_args(&args, "first_year", "first_month") {
            Err(message) => return Ok(ToolOutput::error(message)),
            Ok(None) => return Ok(ToolOutput::error("the `first_year` argument is required")),
            Ok(Some(period)) => period,
        };
        let second = match period_from_args(&args, "second_year", "second_month") {
            Err(message) => return Ok(ToolOutput::error(message)),
            Ok(None) => return Ok(ToolOutput::error("the `second_year` argument is required")),
            Ok(Some(period)) => period,
        };

        let comparison = compare_periods(&context.records, &first, &second, COMPARE_TOP_N);
        let content = json!({
            "first": period_stats_json(&comparison.first),
            "second": period_stats_json(&comparison.second),
            "new_artists": comparison.new_artists,
            "dropped_artists": comparison.dropped_artists,
        });
        Ok(ToolOutput::ok(content.to_string(), comparison.render()))
    }
}
