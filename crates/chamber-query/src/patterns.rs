// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lexical recognition for listening-history questions.
//!
//! Everything here is deterministic text matching. No network, no LLM,
//! no allocation beyond the candidate lists themselves.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;

/// Words never accepted as artist-name candidates (case-insensitive).
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of",
    "with", "by", "from", "was", "were", "been", "have", "has", "did", "does",
    "do", "is", "are", "am", "what", "when", "where", "who", "why", "how",
    "this", "that", "these", "those", "my", "your", "music", "listening",
    "listen", "played", "play", "heard", "hear",
];

struct MonthName {
    full: &'static str,
    abbrev: &'static str,
    display: &'static str,
}

const MONTHS: [MonthName; 12] = [
    MonthName { full: "january", abbrev: "jan", display: "January" },
    MonthName { full: "february", abbrev: "feb", display: "February" },
    MonthName { full: "march", abbrev: "mar", display: "March" },
    MonthName { full: "april", abbrev: "apr", display: "April" },
    MonthName { full: "may", abbrev: "may", display: "May" },
    MonthName { full: "june", abbrev: "jun", display: "June" },
    MonthName { full: "july", abbrev: "jul", display: "July" },
    MonthName { full: "august", abbrev: "aug", display: "August" },
    MonthName { full: "september", abbrev: "sep", display: "September" },
    MonthName { full: "october", abbrev: "oct", display: "October" },
    MonthName { full: "november", abbrev: "nov", display: "November" },
    MonthName { full: "december", abbrev: "dec", display: "December" },
];

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());

static MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+((?:19|20)\d{2})\b",
    )
    .unwrap()
});

static COMPARISON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(compare[sd]?|comparing|comparison|vs\.?|versus|different|difference)\b")
        .unwrap()
});

static SUPERLATIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(most|favorite|favourite|top|biggest)\b").unwrap());

static ALL_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\ball[\s-]time\b|\bever\b|\boverall\b|\bof all\b").unwrap());

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]{1,80})"|“([^”]{1,80})”|‘([^’]{1,80})’"#).unwrap());

static PREP_ARTIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:by|from|to|about)\s+([A-Z][\w.&'’!$+-]*(?:\s+(?:of|the|and|at|a|&|[A-Z0-9][\w.&'’!$+-]*))*)",
    )
    .unwrap()
});

static CAP_RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][\w.&'’!$+-]*(?:\s+(?:of|the|and|at|a|&|[A-Z0-9][\w.&'’!$+-]*))*")
        .unwrap()
});

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\w&'’.!$+-]+").unwrap());

/// Longest artist-name candidate considered in the n-gram sweep.
const MAX_NGRAM_WORDS: usize = 4;

/// Upper bound on candidates returned from one message.
const MAX_CANDIDATES: usize = 64;

/// A half-open date range with a human-readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    /// One calendar year.
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            label: year.to_string(),
            start: month_start(year, 1)?,
            end: month_start(year + 1, 1)?,
        })
    }

    /// One calendar month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let display = MONTHS.get(month.checked_sub(1)? as usize)?.display;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        Some(Self {
            label: format!("{display} {year}"),
            start: month_start(year, month)?,
            end: month_start(next_year, next_month)?,
        })
    }

    /// A range covering the whole dataset, labelled "all time".
    pub fn all_time(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            label: "all time".to_string(),
            start,
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Some(NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?.and_utc())
}

pub fn is_stopword(word: &str) -> bool {
    let lower = word.to_lowercase();
    STOPWORDS.contains(&lower.as_str())
}

/// Distinct 4-digit years in order of first appearance.
pub fn find_years(text: &str) -> Vec<i32> {
    let mut years = Vec::new();
    for caps in YEAR_RE.captures_iter(text) {
        if let Some(year) = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok()) {
            if !years.contains(&year) {
                years.push(year);
            }
        }
    }
    years
}

/// The first `Month YYYY` span, as `(month, year)`.
pub fn find_month_year(text: &str) -> Option<(u32, i32)> {
    let caps = MONTH_YEAR_RE.captures(text)?;
    let month = month_number(caps.get(1)?.as_str())?;
    let year = caps.get(2)?.as_str().parse::<i32>().ok()?;
    Some((month, year))
}

/// Blank out `Month YYYY` spans so month names do not read as artist names.
pub fn strip_month_year(text: &str) -> String {
    MONTH_YEAR_RE.replace_all(text, " ").into_owned()
}

/// Display name for a 1-based month number, or an empty string.
pub(crate) fn month_display(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTHS.get(i as usize))
        .map(|m| m.display)
        .unwrap_or("")
}

fn month_number(token: &str) -> Option<u32> {
    let t = token.to_lowercase();
    let t = t.trim_end_matches('.');
    let t = if t == "sept" { "sep" } else { t };
    MONTHS
        .iter()
        .position(|m| m.full == t || m.abbrev == t)
        .map(|i| i as u32 + 1)
}

/// Resolve the most specific period mentioned in `text`, if any.
///
/// Precedence: `Month YYYY`, then relative phrases resolved against `now`,
/// then a bare year.
pub fn find_period(text: &str, now: DateTime<Utc>) -> Option<Period> {
    if let Some((month, year)) = find_month_year(text) {
        return Period::month(year, month);
    }
    let lower = text.to_lowercase();
    if lower.contains("last year") {
        return Period::year(now.year() - 1);
    }
    if lower.contains("this year") {
        return Period::year(now.year());
    }
    if lower.contains("last month") {
        let (year, month) = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };
        return Period::month(year, month);
    }
    if lower.contains("this month") {
        return Period::month(now.year(), now.month());
    }
    find_years(&lower).first().and_then(|&y| Period::year(y))
}

pub fn has_comparison_marker(text: &str) -> bool {
    COMPARISON_RE.is_match(&text.to_lowercase())
}

pub fn has_all_time_superlative(text: &str) -> bool {
    let lower = text.to_lowercase();
    SUPERLATIVE_RE.is_match(&lower) && ALL_TIME_RE.is_match(&lower)
}

/// Artist-name candidates in priority order.
///
/// Quoted spans first, then names after by/from/to/about, then capitalized
/// runs, then a raw n-gram sweep. Candidates made entirely of stopwords are
/// rejected. Callers still have to check candidates against the artists that
/// actually occur in the dataset.
pub fn artist_candidates(message: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |candidate: &str, out: &mut Vec<String>| {
        let trimmed = trim_connectors(candidate.trim());
        if trimmed.is_empty() || all_stopwords(trimmed) {
            return;
        }
        if out.len() < MAX_CANDIDATES
            && !out.iter().any(|c| c.eq_ignore_ascii_case(trimmed))
        {
            out.push(trimmed.to_string());
        }
    };

    for caps in QUOTED_RE.captures_iter(message) {
        for group in 1..=3 {
            if let Some(m) = caps.get(group) {
                push(m.as_str(), &mut out);
            }
        }
    }
    for caps in PREP_ARTIST_RE.captures_iter(message) {
        if let Some(m) = caps.get(1) {
            push(m.as_str(), &mut out);
        }
    }
    for m in CAP_RUN_RE.find_iter(message) {
        push(m.as_str(), &mut out);
    }

    let words: Vec<&str> = WORD_RE.find_iter(message).map(|m| m.as_str()).collect();
    for len in (1..=MAX_NGRAM_WORDS.min(words.len())).rev() {
        for window in words.windows(len) {
            if len == 1 && window[0].chars().count() < 2 {
                continue;
            }
            push(&window.join(" "), &mut out);
        }
    }

    out
}

fn all_stopwords(candidate: &str) -> bool {
    candidate.split_whitespace().all(is_stopword)
}

/// Drop trailing connector words a capitalized-run match may have swallowed.
fn trim_connectors(candidate: &str) -> &str {
    const CONNECTORS: &[&str] = &["of", "the", "and", "at", "a", "&"];
    let mut end = candidate.len();
    loop {
        let head = candidate[..end].trim_end();
        let Some(last) = head.split_whitespace().last() else {
            return head;
        };
        if CONNECTORS.contains(&last) {
            end = head.len() - last.len();
        } else {
            return head;
        }
    }
}
