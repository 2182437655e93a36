// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immutable app-state store for the Rhythm Chamber turn engine.
//!
//! State is a single snapshot split into six isolated domains. Updates
//! clone, mutate and atomically swap; readers hold snapshots that later
//! updates can never touch. Change subscribers are notified once per burst
//! with the coalesced list of changed domains.

pub mod domains;
pub mod store;

pub use domains::{
    AppState, DataState, DemoState, Domain, LiteState, OperationsState, Personality, UiState,
    ViewState,
};
pub use store::{StateStore, SubscriptionId};
