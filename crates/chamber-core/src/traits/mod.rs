// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability trait definitions for the Rhythm Chamber turn engine.
//!
//! Everything the engine takes from its environment (wall clock, id source,
//! durable storage, synchronous key-value storage, chat providers, retrieval)
//! sits behind one of these traits so tests can drive the core with fakes.

pub mod clock;
pub mod idgen;
pub mod provider;
pub mod retriever;
pub mod store;

// Re-export all traits at the traits module level for convenience.
pub use clock::{Clock, SystemClock};
pub use idgen::{IdGen, UuidGen};
pub use provider::{ChatProvider, ProgressSink, ProviderProfile};
pub use retriever::ContextRetriever;
pub use store::{SessionStore, SyncKv};
