// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The six state domains and the snapshot that holds them.
//!
//! Domains never reference each other; in particular the demo dataset is a
//! full copy of the real dataset's shape so switching into demo mode can
//! never leak real listening data.

use strum::Display;

use chamber_core::{ListenerProfile, StreamRecord};

/// Immutable snapshot of everything the app knows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub view: ViewState,
    pub data: DataState,
    pub lite: LiteState,
    pub ui: UiState,
    pub operations: OperationsState,
    pub demo: DemoState,
}

impl AppState {
    /// The dataset readers should consult, demo or real.
    pub fn active_data(&self) -> &DataState {
        if self.demo.is_demo_mode {
            &self.demo.data
        } else {
            &self.data
        }
    }
}

/// The closed set of state domains.
///
/// Declaration order is the order changed-domain lists are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Domain {
    View,
    Data,
    Lite,
    Ui,
    Operations,
    Demo,
}

/// Which screen the shell is presenting.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub current: String,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            current: "chat".to_string(),
        }
    }
}

/// The listener's real dataset and what was derived from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataState {
    pub streams: Vec<StreamRecord>,
    pub profile: Option<ListenerProfile>,
    pub personality: Option<Personality>,
}

/// Listening-personality summary produced by the excluded detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Personality {
    pub name: String,
    pub emoji: String,
}

/// Token-saving lite mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiteState {
    pub is_lite_mode: bool,
}

/// Presentation flags the engine records but never acts on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    pub sidebar_open: bool,
    pub active_modal: Option<String>,
}

/// In-flight work counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationsState {
    pub turn_in_flight: bool,
    pub queued_turns: usize,
}

/// Demo dataset, isolated from the real one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemoState {
    pub is_demo_mode: bool,
    pub data: DataState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_names_render_lowercase() {
        assert_eq!(Domain::View.to_string(), "view");
        assert_eq!(Domain::Operations.to_string(), "operations");
    }

    #[test]
    fn domains_order_by_declaration() {
        let mut domains = vec![Domain::Demo, Domain::Data, Domain::View];
        domains.sort();
        assert_eq!(domains, vec![Domain::View, Domain::Data, Domain::Demo]);
    }

    #[test]
    fn active_data_follows_demo_mode() {
        let mut state = AppState::default();
        state.data.streams = vec![record("Deftones")];
        state.demo.data.streams = vec![record("Demo Artist")];

        assert_eq!(state.active_data().streams[0].artist, "Deftones");
        state.demo.is_demo_mode = true;
        assert_eq!(state.active_data().streams[0].artist, "Demo Artist");
    }

    fn record(artist: &str) -> StreamRecord {
        StreamRecord {
            ts: chrono::DateTime::UNIX_EPOCH,
            artist: artist.to_string(),
            track: "Track".to_string(),
            ms_played: 60_000,
        }
    }
}
