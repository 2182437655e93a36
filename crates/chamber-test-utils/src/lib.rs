// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Rhythm Chamber integration tests.
//!
//! Provides mock collaborators and deterministic capability sources for
//! fast, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Scripted chat provider with recorded requests
//! - [`MemorySessionStore`] / [`MemorySyncKv`] - In-memory storage backends
//! - [`ManualClock`] / [`SeqIdGen`] - Deterministic time and id sources
//! - [`fixtures`] - Listening-history fixture builders

pub mod determinism;
pub mod fixtures;
pub mod memory_store;
pub mod mock_provider;

pub use determinism::{ManualClock, SeqIdGen};
pub use memory_store::{MemorySessionStore, MemorySyncKv};
pub use mock_provider::{MockProvider, text_response, tool_call_response};
