// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Rhythm Chamber turn engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`, plus the
//! synchronous file-backed key-value store used for the emergency
//! shutdown snapshot.

pub mod database;
pub mod file_kv;
pub mod migrations;
pub mod queries;
pub mod store;

pub use database::Database;
pub use file_kv::FileKv;
pub use store::SqliteStore;
