// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic intent classification for the third ladder level.
//!
//! Maps a user message onto one catalog function with keyword rules plus the
//! shared period patterns. Only unambiguous matches are returned; anything
//! uncertain yields `None` so the ladder can fall through.

use chamber_query::{find_period, find_years};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::builtin::period_args;

/// One classified function call candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub function: String,
    pub arguments: Value,
}

impl Intent {
    fn new(function: &str, arguments: Value) -> Self {
        Self {
            function: function.to_string(),
            arguments,
        }
    }
}

fn has_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Classifies `message` into a catalog call, or `None` when no rule fires
/// with confidence.
pub fn classify(message: &str, now: DateTime<Utc>) -> Option<Intent> {
    let lower = message.to_lowercase();
    let period = find_period(message, now);

    // Two years plus a comparison word is the strongest signal.
    if has_any(&lower, &["compare", " vs ", " vs.", "versus"]) {
        let years = find_years(message);
        if let [first, second, ..] = years[..] {
            return Some(Intent::new(
                "comparePeriods",
                json!({"first_year": first, "second_year": second}),
            ));
        }
    }

    if has_any(&lower, &["hour", "how long", "listening time"]) {
        if let Some(period) = &period {
            return Some(Intent::new("hoursInPeriod", period_args(period)));
        }
    }

    let superlative = has_any(&lower, &["top", "most played", "favorite", "favourite"]);
    if superlative && has_any(&lower, &["track", "song"]) {
        let mut args = period.as_ref().map(period_args).unwrap_or_else(|| json!({}));
        if has_any(&lower, &["tracks", "songs"]) {
            args["count"] = json!(5);
        }
        return Some(Intent::new("topTracks", args));
    }
    if superlative && lower.contains("artist") {
        let mut args = period.as_ref().map(period_args).unwrap_or_else(|| json!({}));
        if lower.contains("artists") {
            args["count"] = json!(5);
        }
        return Some(Intent::new("topArtist", args));
    }

    if period.is_some()
        && has_any(&lower, &["summary", "stats", "overview", "recap", "listen"])
    {
        return Some(Intent::new(
            "periodSummary",
            period_args(period.as_ref()?),
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2024-06-15T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn comparison_questions_map_to_compare_periods() {
        let intent = classify("Compare 2021 vs 2022 for me", now()).unwrap();
        assert_eq!(intent.function, "comparePeriods");
        assert_eq!(
            intent.arguments,
            json!({"first_year": 2021, "second_year": 2022})
        );
    }

    #[test]
    fn hours_questions_need_a_period() {
        let intent = classify("How many hours did I listen in March 2021?", now()).unwrap();
        assert_eq!(intent.function, "hoursInPeriod");
        assert_eq!(intent.arguments, json!({"year": 2021, "month": 3}));

        assert!(classify("How many hours of music do I have?", now()).is_none());
    }

    #[test]
    fn top_artist_questions_carry_the_period() {
        let intent = classify("Who was my top artist in 2020?", now()).unwrap();
        assert_eq!(intent.function, "topArtist");
        assert_eq!(intent.arguments, json!({"year": 2020}));
    }

    #[test]
    fn plural_top_lists_request_five() {
        let intent = classify("Show my top artists of 2020", now()).unwrap();
        assert_eq!(intent.function, "topArtist");
        assert_eq!(intent.arguments, json!({"year": 2020, "count": 5}));

        let intent = classify("What were my favorite songs in 2019?", now()).unwrap();
        assert_eq!(intent.function, "topTracks");
        assert_eq!(intent.arguments, json!({"year": 2019, "count": 5}));
    }

    #[test]
    fn top_without_a_period_means_all_time() {
        let intent = classify("What's my most played song?", now()).unwrap();
        assert_eq!(intent.function, "topTracks");
        assert_eq!(intent.arguments, json!({}));
    }

    #[test]
    fn period_plus_listening_keyword_is_a_summary() {
        let intent = classify("What did I listen to in 2022?", now()).unwrap();
        assert_eq!(intent.function, "periodSummary");
        assert_eq!(intent.arguments, json!({"year": 2022}));
    }

    #[test]
    fn unrelated_messages_do_not_classify() {
        assert!(classify("Tell me a joke", now()).is_none());
        assert!(classify("What is the weather like?", now()).is_none());
    }

    #[test]
    fn tracks_beat_artists_when_both_words_appear() {
        let intent = classify("Top songs by my top artist in 2021", now()).unwrap();
        assert_eq!(intent.function, "topTracks");
    }
}
