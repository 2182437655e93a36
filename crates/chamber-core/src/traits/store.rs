// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence capabilities: the durable session store and the synchronous
//! key-value store used on the shutdown path.

use async_trait::async_trait;

use crate::error::ChamberError;
use crate::types::Session;

/// Durable storage for sessions and small configuration values.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts or replaces a session by id.
    async fn save_session(&self, session: &Session) -> Result<(), ChamberError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, ChamberError>;

    /// All sessions, newest first.
    async fn all_sessions(&self) -> Result<Vec<Session>, ChamberError>;

    async fn delete_session(&self, id: &str) -> Result<(), ChamberError>;

    async fn rename_session(&self, id: &str, title: &str) -> Result<(), ChamberError>;

    async fn get_config(&self, key: &str) -> Result<Option<String>, ChamberError>;

    async fn set_config(&self, key: &str, value: &str) -> Result<(), ChamberError>;

    async fn remove_config(&self, key: &str) -> Result<(), ChamberError>;
}

/// Small synchronous key-value storage.
///
/// Implementations must complete without awaiting: the emergency snapshot is
/// written from a host shutdown hook where no executor is guaranteed to run
/// again.
pub trait SyncKv: Send + Sync {
    fn set_item(&self, key: &str, value: &str) -> Result<(), ChamberError>;

    fn get_item(&self, key: &str) -> Result<Option<String>, ChamberError>;

    fn remove_item(&self, key: &str) -> Result<(), ChamberError>;
}
