// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregations over the local streaming history, with compact renderings
//! suitable for prompt context and direct replies.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, Utc};

use chamber_core::{ListenerProfile, StreamRecord};

use crate::patterns::{month_display, Period};

/// Plays bucketed by calendar month, keyed `(year, month)`.
pub type MonthlyPlays = BTreeMap<(i32, u32), u64>;

/// An artist counts as ghosted only above this lifetime play count.
const GHOST_MIN_PLAYS: u64 = 10;

/// Days of silence after which a heavy-rotation artist counts as ghosted.
const GHOST_AFTER_DAYS: i64 = 180;

/// Names listed before a comparison rendering switches to "and N more".
const RENDERED_NAME_CAP: usize = 8;

fn hours(ms: u64) -> f64 {
    ms as f64 / 3_600_000.0
}

/// Lowercased artist name to display casing, first occurrence wins.
pub fn artist_index(records: &[StreamRecord]) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for record in records {
        index
            .entry(record.artist.to_lowercase())
            .or_insert_with(|| record.artist.clone());
    }
    index
}

/// The half-open range covering every record, labelled "all time".
pub fn dataset_period(records: &[StreamRecord]) -> Option<Period> {
    let start = records.iter().map(|r| r.ts).min()?;
    let end = records.iter().map(|r| r.ts).max()? + Duration::seconds(1);
    Some(Period::all_time(start, end))
}

/// Aggregate listening facts for one period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodStats {
    pub label: String,
    pub plays: u64,
    pub hours: f64,
    pub unique_artists: usize,
    pub unique_tracks: usize,
    /// `(artist, plays)`, most played first.
    pub top_artists: Vec<(String, u64)>,
    /// `(track, artist, plays)`, most played first.
    pub top_tracks: Vec<(String, String, u64)>,
}

pub fn period_stats(records: &[StreamRecord], period: &Period, top_n: usize) -> PeriodStats {
    let mut artist_plays: HashMap<String, (String, u64)> = HashMap::new();
    let mut track_plays: HashMap<(String, String), (String, String, u64)> = HashMap::new();
    let mut plays = 0u64;
    let mut ms_total = 0u64;

    for record in records.iter().filter(|r| period.contains(r.ts)) {
        plays += 1;
        ms_total += record.ms_played;
        let artist_entry = artist_plays
            .entry(record.artist.to_lowercase())
            .or_insert_with(|| (record.artist.clone(), 0));
        artist_entry.1 += 1;
        let track_entry = track_plays
            .entry((record.artist.to_lowercase(), record.track.to_lowercase()))
            .or_insert_with(|| (record.track.clone(), record.artist.clone(), 0));
        track_entry.2 += 1;
    }

    let unique_artists = artist_plays.len();
    let unique_tracks = track_plays.len();

    let mut top_artists: Vec<(String, u64)> = artist_plays.into_values().collect();
    top_artists.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_artists.truncate(top_n);

    let mut top_tracks: Vec<(String, String, u64)> = track_plays.into_values().collect();
    top_tracks.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
    top_tracks.truncate(top_n);

    PeriodStats {
        label: period.label.clone(),
        plays,
        hours: hours(ms_total),
        unique_artists,
        unique_tracks,
        top_artists,
        top_tracks,
    }
}

impl PeriodStats {
    pub fn render(&self) -> String {
        if self.plays == 0 {
            return format!("No listening recorded for {}.", self.label);
        }
        let mut out = format!(
            "Listening stats for {}: {} plays, {:.1} hours, {} unique artists, {} unique tracks.",
            self.label, self.plays, self.hours, self.unique_artists, self.unique_tracks
        );
        if !self.top_artists.is_empty() {
            let list = self
                .top_artists
                .iter()
                .map(|(artist, plays)| format!("{artist} ({plays})"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("\nTop artists: {list}."));
        }
        if !self.top_tracks.is_empty() {
            let list = self
                .top_tracks
                .iter()
                .map(|(track, artist, plays)| format!("\"{track}\" by {artist} ({plays})"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("\nTop tracks: {list}."));
        }
        out
    }
}

/// Whole-history facts about one artist.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistStats {
    pub artist: String,
    pub plays: u64,
    pub hours: f64,
    pub first_listen: DateTime<Utc>,
    pub last_listen: DateTime<Utc>,
    /// `(year, month, plays)` of the busiest month, earliest wins ties.
    pub peak_month: (i32, u32, u64),
    pub monthly: MonthlyPlays,
}

pub fn artist_stats(records: &[StreamRecord], artist: &str) -> Option<ArtistStats> {
    let needle = artist.to_lowercase();
    let mut display: Option<String> = None;
    let mut plays = 0u64;
    let mut ms_total = 0u64;
    let mut first: Option<DateTime<Utc>> = None;
    let mut last: Option<DateTime<Utc>> = None;
    let mut monthly: MonthlyPlays = BTreeMap::new();

    for record in records {
        if record.artist.to_lowercase() != needle {
            continue;
        }
        if display.is_none() {
            display = Some(record.artist.clone());
        }
        plays += 1;
        ms_total += record.ms_played;
        first = Some(first.map_or(record.ts, |f| f.min(record.ts)));
        last = Some(last.map_or(record.ts, |l| l.max(record.ts)));
        *monthly.entry((record.ts.year(), record.ts.month())).or_insert(0) += 1;
    }

    let mut peak_month = (0, 0, 0);
    for (&(year, month), &count) in &monthly {
        if count > peak_month.2 {
            peak_month = (year, month, count);
        }
    }

    Some(ArtistStats {
        artist: display?,
        plays,
        hours: hours(ms_total),
        first_listen: first?,
        last_listen: last?,
        peak_month,
        monthly,
    })
}

impl ArtistStats {
    pub fn spans_multiple_months(&self) -> bool {
        self.monthly.len() > 1
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{}: {} plays, {:.1} hours. First listen {}, last listen {}. Peak month: {} {} ({} plays).",
            self.artist,
            self.plays,
            self.hours,
            self.first_listen.format("%Y-%m-%d"),
            self.last_listen.format("%Y-%m-%d"),
            month_display(self.peak_month.1),
            self.peak_month.0,
            self.peak_month.2
        );
        if self.spans_multiple_months() {
            let list = self
                .monthly
                .iter()
                .map(|(&(year, month), &count)| {
                    format!("{} {} ({})", month_display(month), year, count)
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("\nMonthly plays: {list}."));
        }
        out
    }
}

/// Two periods side by side, with artist churn between them.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonStats {
    pub first: PeriodStats,
    pub second: PeriodStats,
    /// Played in the second period, absent from the first.
    pub new_artists: Vec<String>,
    /// Played in the first period, absent from the second.
    pub dropped_artists: Vec<String>,
}

pub fn compare_periods(
    records: &[StreamRecord],
    first: &Period,
    second: &Period,
    top_n: usize,
) -> ComparisonStats {
    let first_stats = period_stats(records, first, top_n);
    let second_stats = period_stats(records, second, top_n);
    let first_artists = period_artists(records, first);
    let second_artists = period_artists(records, second);

    let new_artists = churn(&second_artists, &first_artists);
    let dropped_artists = churn(&first_artists, &second_artists);

    ComparisonStats {
        first: first_stats,
        second: second_stats,
        new_artists,
        dropped_artists,
    }
}

fn period_artists(records: &[StreamRecord], period: &Period) -> HashMap<String, (String, u64)> {
    let mut artists: HashMap<String, (String, u64)> = HashMap::new();
    for record in records.iter().filter(|r| period.contains(r.ts)) {
        let entry = artists
            .entry(record.artist.to_lowercase())
            .or_insert_with(|| (record.artist.clone(), 0));
        entry.1 += 1;
    }
    artists
}

/// Artists in `kept` that never appear in `other`, heaviest rotation first.
fn churn(
    kept: &HashMap<String, (String, u64)>,
    other: &HashMap<String, (String, u64)>,
) -> Vec<String> {
    let mut out: Vec<(String, u64)> = kept
        .iter()
        .filter(|(key, _)| !other.contains_key(*key))
        .map(|(_, (display, plays))| (display.clone(), *plays))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out.into_iter().map(|(name, _)| name).collect()
}

impl ComparisonStats {
    pub fn render(&self) -> String {
        let mut out = format!(
            "Comparing {} and {}:\n{}\n{}",
            self.first.label,
            self.second.label,
            self.first.render(),
            self.second.render()
        );
        if !self.new_artists.is_empty() {
            out.push_str(&format!(
                "\nNew in {}: {}.",
                self.second.label,
                cap_list(&self.new_artists)
            ));
        }
        if !self.dropped_artists.is_empty() {
            out.push_str(&format!(
                "\nNo longer played in {}: {}.",
                self.second.label,
                cap_list(&self.dropped_artists)
            ));
        }
        out
    }
}

fn cap_list(names: &[String]) -> String {
    if names.len() <= RENDERED_NAME_CAP {
        names.join(", ")
    } else {
        format!(
            "{} and {} more",
            names[..RENDERED_NAME_CAP].join(", "),
            names.len() - RENDERED_NAME_CAP
        )
    }
}

/// Facts the engine can always state about the listener, for replies that
/// must be produced without a model.
pub fn listener_profile(records: &[StreamRecord]) -> ListenerProfile {
    let mut artists: HashMap<String, (String, u64, DateTime<Utc>)> = HashMap::new();
    let mut ms_total = 0u64;
    let mut newest: Option<DateTime<Utc>> = None;

    for record in records {
        ms_total += record.ms_played;
        newest = Some(newest.map_or(record.ts, |n| n.max(record.ts)));
        let entry = artists
            .entry(record.artist.to_lowercase())
            .or_insert_with(|| (record.artist.clone(), 0, record.ts));
        entry.1 += 1;
        entry.2 = entry.2.max(record.ts);
    }

    let top_artist = artists
        .values()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(name, _, _)| name.clone());

    let ghosted_artists = match newest {
        Some(newest) => {
            let cutoff = newest - Duration::days(GHOST_AFTER_DAYS);
            let mut ghosted: Vec<(String, u64)> = artists
                .values()
                .filter(|(_, plays, last)| *plays >= GHOST_MIN_PLAYS && *last < cutoff)
                .map(|(name, plays, _)| (name.clone(), *plays))
                .collect();
            ghosted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            ghosted.truncate(3);
            ghosted.into_iter().map(|(name, _)| name).collect()
        }
        None => Vec::new(),
    };

    ListenerProfile {
        top_artist,
        total_hours: hours(ms_total),
        ghosted_artists,
    }
}
