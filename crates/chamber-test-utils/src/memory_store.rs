// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage backends for tests.
//!
//! `MemorySessionStore` mirrors the durable store contract; `MemorySyncKv`
//! mirrors the synchronous key-value store used on the shutdown path.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use chamber_core::{ChamberError, Session, SessionStore, SyncKv};

/// In-memory `SessionStore` with optional write-failure injection.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    config: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    saves: AtomicU64,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every mutating operation fails with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Number of `save_session` calls that reached the store.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), ChamberError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ChamberError::Storage {
                source: Box::new(std::io::Error::other("injected write failure")),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save_session(&self, session: &Session) -> Result<(), ChamberError> {
        self.check_writable()?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, ChamberError> {
        Ok(self.sessions.lock().await.get(id).cloned())
    }

    async fn all_sessions(&self) -> Result<Vec<Session>, ChamberError> {
        let mut sessions: Vec<Session> = self.sessions.lock().await.values().cloned().collect();
        // Newest first; RFC 3339 strings order chronologically.
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn delete_session(&self, id: &str) -> Result<(), ChamberError> {
        self.check_writable()?;
        self.sessions.lock().await.remove(id);
        Ok(())
    }

    async fn rename_session(&self, id: &str, title: &str) -> Result<(), ChamberError> {
        self.check_writable()?;
        if let Some(session) = self.sessions.lock().await.get_mut(id) {
            session.title = title.to_string();
        }
        Ok(())
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, ChamberError> {
        Ok(self.config.lock().await.get(key).cloned())
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), ChamberError> {
        self.check_writable()?;
        self.config
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_config(&self, key: &str) -> Result<(), ChamberError> {
        self.check_writable()?;
        self.config.lock().await.remove(key);
        Ok(())
    }
}

/// In-memory `SyncKv` backed by a plain map.
#[derive(Default)]
pub struct MemorySyncKv {
    items: StdMutex<HashMap<String, String>>,
}

impl MemorySyncKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, ChamberError> {
        self.items.lock().map_err(|_| ChamberError::Storage {
            source: Box::new(std::io::Error::other("sync store lock poisoned")),
        })
    }
}

impl SyncKv for MemorySyncKv {
    fn set_item(&self, key: &str, value: &str) -> Result<(), ChamberError> {
        self.locked()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, ChamberError> {
        Ok(self.locked()?.get(key).cloned())
    }

    fn remove_item(&self, key: &str) -> Result<(), ChamberError> {
        self.locked()?.remove(key);
        Ok(())
    }
}
