// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversational turn engine for Rhythm Chamber.
//!
//! Wires the session manager, provider client, prompt builder, token
//! accountant, and function-calling ladder into one pipeline behind a
//! strict FIFO turn queue: a follow-up message is never processed before
//! the previous turn produced its final assistant reply. Hosts construct a
//! [`ChamberEngine`], subscribe to its event bus, and push messages; every
//! push resolves to exactly one final reply unless the turn is cancelled.
//!
//! When the model cannot be reached the engine still answers, degrading to
//! a deterministic reply built from the imported listening data together
//! with the steps to bring the configured backend back.

pub mod engine;
pub mod fallback;
pub mod orchestrator;
pub mod queue;

pub use engine::ChamberEngine;
pub use fallback::{fallback_reply, no_key_reply};
pub use orchestrator::ChatOrchestrator;
pub use queue::{TurnOptions, TurnQueue, TurnTicket};
