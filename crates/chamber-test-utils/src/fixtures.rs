// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Listening-history fixture builders shared across crate tests.

use chrono::{DateTime, Utc};

use chamber_core::StreamRecord;

/// Build one stream record from an RFC 3339 timestamp and a play length in
/// whole minutes.
///
/// Panics on a malformed timestamp; fixtures are authored inline in tests.
pub fn stream_record(ts: &str, artist: &str, track: &str, minutes: u64) -> StreamRecord {
    let ts: DateTime<Utc> = ts.parse().expect("fixture timestamp must be RFC 3339");
    StreamRecord {
        ts,
        artist: artist.to_string(),
        track: track.to_string(),
        ms_played: minutes * 60_000,
    }
}

/// A small two-year listening history with a clear shape:
///
/// - Deftones is the overall top artist (5 plays across 2021 and 2022)
/// - Paramore stops playing after February 2021 (a ghosting candidate)
/// - Mitski appears only in 2022
pub fn listening_history() -> Vec<StreamRecord> {
    vec![
        stream_record("2021-02-03T18:20:00Z", "Paramore", "Still Into You", 4),
        stream_record("2021-02-10T19:05:00Z", "Paramore", "Hard Times", 3),
        stream_record("2021-03-06T21:00:00Z", "Deftones", "Change", 5),
        stream_record("2021-07-14T08:30:00Z", "Deftones", "Digital Bath", 4),
        stream_record("2021-11-02T23:10:00Z", "Deftones", "Sextape", 4),
        stream_record("2022-01-11T10:00:00Z", "Deftones", "Be Quiet and Drive", 5),
        stream_record("2022-02-18T17:45:00Z", "Mitski", "First Love / Late Spring", 4),
        stream_record("2022-02-25T18:00:00Z", "Mitski", "Washing Machine Heart", 3),
        stream_record("2022-03-09T20:15:00Z", "Deftones", "Rosemary", 6),
    ]
}
