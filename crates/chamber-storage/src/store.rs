// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `SessionStore` trait.

use async_trait::async_trait;
use tracing::debug;

use chamber_config::StorageConfig;
use chamber_core::{ChamberError, Session, SessionStore};

use crate::database::Database;
use crate::queries;

/// SQLite-backed durable store for sessions and config values.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the store described by the storage configuration.
    pub async fn open(config: &StorageConfig) -> Result<Self, ChamberError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "session store opened");
        Ok(Self { db })
    }

    /// Checkpoint and close the underlying connection.
    pub async fn close(self) -> Result<(), ChamberError> {
        self.db.close().await
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn save_session(&self, session: &Session) -> Result<(), ChamberError> {
        queries::sessions::upsert_session(&self.db, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, ChamberError> {
        queries::sessions::get_session(&self.db, id).await
    }

    async fn all_sessions(&self) -> Result<Vec<Session>, ChamberError> {
        queries::sessions::all_sessions(&self.db).await
    }

    async fn delete_session(&self, id: &str) -> Result<(), ChamberError> {
        queries::sessions::delete_session(&self.db, id).await
    }

    async fn rename_session(&self, id: &str, title: &str) -> Result<(), ChamberError> {
        queries::sessions::rename_session(&self.db, id, title).await
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, ChamberError> {
        queries::config::get_config(&self.db, key).await
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), ChamberError> {
        queries::config::set_config(&self.db, key, value).await
    }

    async fn remove_config(&self, key: &str) -> Result<(), ChamberError> {
        queries::config::remove_config(&self.db, key).await
    }
}
