// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle manager for the live conversation session.
//!
//! The manager owns the in-memory session and is responsible for:
//! - Creating, loading, switching, deleting, and renaming sessions
//! - Debounced persistence through the background saver task
//! - The synchronous emergency snapshot on host shutdown
//! - Boot-time recovery and legacy-conversation migration
//!
//! A session moves through the states ephemeral (never persisted), dirty
//! (edits pending), and saved. Edits mutate the live copy under a short
//! lock; the durable store is only ever touched by the saver task.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use strum::Display;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use chamber_config::SessionConfig;
use chamber_core::{
    ChamberError, ChatMessage, Clock, EngineEvent, EventBus, IdGen, Role, Session,
    SessionMetadata, SessionStore, SyncKv,
};

use crate::backup::write_backup;
use crate::recovery::{migrate_legacy_conversation, recover_from_backup};
use crate::saver::{SaverCommand, saver_loop};

/// Title given to sessions before the first user message names them.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Derived titles are clipped to this many characters.
const TITLE_MAX_CHARS: usize = 50;

/// Persistence state of the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SaveState {
    /// Never persisted. Empty new sessions stay here until the first edit.
    Ephemeral,
    /// Carries edits the durable store has not seen.
    Dirty,
    /// The durable record matches the live session.
    Saved,
}

/// State shared between the manager and the saver task.
pub(crate) struct Shared {
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) bus: EventBus,
    pub(crate) current: StdMutex<Option<LiveSession>>,
    /// Trailing message window kept by durable writes and snapshots.
    pub(crate) cap: usize,
}

/// The in-memory session plus its persistence bookkeeping.
pub(crate) struct LiveSession {
    pub(crate) session: Session,
    pub(crate) state: SaveState,
    /// Bumped on every edit so a completed write can tell whether it is stale.
    pub(crate) generation: u64,
}

pub(crate) fn lock_current(shared: &Shared) -> MutexGuard<'_, Option<LiveSession>> {
    shared.current.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the live session and the background saver task.
pub struct SessionManager {
    shared: Arc<Shared>,
    kv: Arc<dyn SyncKv>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGen>,
    config: SessionConfig,
    saver_tx: mpsc::UnboundedSender<SaverCommand>,
}

impl SessionManager {
    /// Create a manager and spawn its saver task on the current runtime.
    pub fn new(
        store: Arc<dyn SessionStore>,
        kv: Arc<dyn SyncKv>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGen>,
        bus: EventBus,
        config: SessionConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            store,
            bus,
            current: StdMutex::new(None),
            cap: config.immediate_save_message_cap,
        });
        let (saver_tx, saver_rx) = mpsc::unbounded_channel();
        tokio::spawn(saver_loop(
            Arc::clone(&shared),
            saver_rx,
            Duration::from_millis(config.save_debounce_ms),
        ));

        Self {
            shared,
            kv,
            clock,
            ids,
            config,
            saver_tx,
        }
    }

    /// Restore state at boot and return the id of the session now current.
    ///
    /// Runs legacy migration and emergency recovery first (both non-fatal),
    /// then resumes the most recent durable session, or starts a fresh chat
    /// when the store is empty.
    pub async fn initialize(&self) -> Result<String, ChamberError> {
        if let Err(error) = migrate_legacy_conversation(
            self.shared.store.as_ref(),
            self.kv.as_ref(),
            self.clock.as_ref(),
            self.ids.as_ref(),
            &self.shared.bus,
        )
        .await
        {
            warn!(%error, "legacy conversation migration failed");
        }

        if let Err(error) = recover_from_backup(
            self.shared.store.as_ref(),
            self.kv.as_ref(),
            self.clock.as_ref(),
            &self.shared.bus,
            self.config.recovery_max_age_secs,
        )
        .await
        {
            warn!(%error, "emergency backup recovery failed");
        }

        for session in self.shared.store.all_sessions().await? {
            if let Err(reason) = validate(&session) {
                warn!(session_id = %session.id, reason, "skipping malformed session record");
                continue;
            }
            let id = session.id.clone();
            self.install(session, SaveState::Saved);
            info!(session_id = %id, "resumed most recent session");
            return Ok(id);
        }

        self.create_new_session(None).await
    }

    /// Start a new session, flushing any pending save of the outgoing one.
    ///
    /// Returns the new session id. With `initial` messages the session starts
    /// dirty and a debounced save is scheduled; otherwise it stays ephemeral
    /// until the first edit.
    pub async fn create_new_session(
        &self,
        initial: Option<Vec<ChatMessage>>,
    ) -> Result<String, ChamberError> {
        if let Err(error) = self.flush(false).await {
            warn!(%error, "could not flush the outgoing session, continuing with a new one");
        }

        let messages = initial.unwrap_or_default();
        let session = Session {
            id: self.ids.new_id(),
            title: title_for_messages(&messages),
            created_at: self.clock.now_rfc3339(),
            messages,
            metadata: SessionMetadata::default(),
        };
        let id = session.id.clone();
        let dirty = !session.messages.is_empty();

        self.install(
            session,
            if dirty {
                SaveState::Dirty
            } else {
                SaveState::Ephemeral
            },
        );
        if dirty {
            self.save_conversation();
        }

        debug!(session_id = %id, "created new session");
        self.shared.bus.publish(EngineEvent::SessionCreated {
            session_id: id.clone(),
        });
        Ok(id)
    }

    /// Append a message to the live session, creating one if none exists.
    ///
    /// The first user message with any text also titles the session. Appending
    /// marks the session dirty but does not schedule a save; callers follow up
    /// with [`save_conversation`](Self::save_conversation) when the edit burst
    /// is done.
    pub fn append_message(&self, message: ChatMessage) {
        let mut created: Option<String> = None;
        {
            let mut guard = lock_current(&self.shared);
            let live = guard.get_or_insert_with(|| {
                let session = Session {
                    id: self.ids.new_id(),
                    title: DEFAULT_TITLE.to_string(),
                    created_at: self.clock.now_rfc3339(),
                    messages: Vec::new(),
                    metadata: SessionMetadata::default(),
                };
                created = Some(session.id.clone());
                LiveSession {
                    session,
                    state: SaveState::Ephemeral,
                    generation: 0,
                }
            });

            if live.session.title == DEFAULT_TITLE
                && let Some(title) = title_from(&message)
            {
                live.session.title = title;
            }
            live.session.messages.push(message);
            live.generation = live.generation.wrapping_add(1);
            live.state = SaveState::Dirty;
        }

        if let Some(session_id) = created {
            self.shared
                .bus
                .publish(EngineEvent::SessionCreated { session_id });
        }
    }

    /// Schedule a debounced save of the live session.
    ///
    /// Repeated calls within the debounce window coalesce into one write.
    pub fn save_conversation(&self) {
        let _ = self.saver_tx.send(SaverCommand::Schedule);
    }

    /// Write the live session to the durable store right now.
    pub async fn save_current_session(&self) -> Result<(), ChamberError> {
        self.flush(true).await.map(|_| ())
    }

    /// Load a session by id and make it current.
    ///
    /// Malformed records are rejected with a log line and `None`; the current
    /// session is left in place.
    pub async fn load_session(&self, id: &str) -> Result<Option<Session>, ChamberError> {
        let Some(session) = self.shared.store.get_session(id).await? else {
            return Ok(None);
        };
        if let Err(reason) = validate(&session) {
            warn!(session_id = %id, reason, "rejecting malformed session record");
            return Ok(None);
        }
        self.install(session.clone(), SaveState::Saved);
        debug!(session_id = %id, "loaded session");
        Ok(Some(session))
    }

    /// Flush the outgoing session, then load `id`.
    pub async fn switch_session(&self, id: &str) -> Result<Option<Session>, ChamberError> {
        if let Err(error) = self.flush(false).await {
            warn!(%error, "could not flush the outgoing session before switching");
        }
        self.load_session(id).await
    }

    /// Delete a session from the store.
    ///
    /// Deleting the current session immediately starts a fresh empty one;
    /// its id is returned.
    pub async fn delete_session_by_id(&self, id: &str) -> Result<Option<String>, ChamberError> {
        self.shared.store.delete_session(id).await?;
        self.shared.bus.publish(EngineEvent::SessionDeleted {
            session_id: id.to_string(),
        });

        let was_current = {
            let mut guard = lock_current(&self.shared);
            match guard.as_ref() {
                Some(live) if live.session.id == id => {
                    *guard = None;
                    true
                }
                _ => false,
            }
        };
        if !was_current {
            return Ok(None);
        }

        let replacement = self.create_new_session(None).await?;
        Ok(Some(replacement))
    }

    /// Rename a persisted session, updating the live copy when it matches.
    pub async fn rename_session(&self, id: &str, title: &str) -> Result<(), ChamberError> {
        self.shared.store.rename_session(id, title).await?;

        let retitled_current = {
            let mut guard = lock_current(&self.shared);
            match guard.as_mut() {
                Some(live) if live.session.id == id => {
                    live.session.title = title.to_string();
                    live.generation = live.generation.wrapping_add(1);
                    live.state = SaveState::Dirty;
                    true
                }
                _ => false,
            }
        };
        if retitled_current {
            self.save_conversation();
        }

        self.shared.bus.publish(EngineEvent::SessionUpdated {
            session_id: id.to_string(),
        });
        Ok(())
    }

    /// Write the emergency snapshot for the live session.
    ///
    /// Synchronous: this is the `beforeunload` path, where no further awaits
    /// are possible. Sessions with no messages are skipped.
    pub fn snapshot_for_shutdown(&self) -> Result<(), ChamberError> {
        let guard = lock_current(&self.shared);
        let Some(live) = guard.as_ref() else {
            return Ok(());
        };
        if live.session.messages.is_empty() {
            debug!("skipping emergency backup for an empty session");
            return Ok(());
        }
        write_backup(
            self.kv.as_ref(),
            &live.session,
            self.shared.cap,
            self.clock.now().timestamp_millis(),
        )
    }

    /// Flush pending edits when the host loses visibility.
    pub async fn flush_on_hide(&self) -> Result<(), ChamberError> {
        self.flush(false).await.map(|_| ())
    }

    /// The live session, cloned.
    pub fn current_session(&self) -> Option<Session> {
        lock_current(&self.shared)
            .as_ref()
            .map(|live| live.session.clone())
    }

    /// Id of the live session.
    pub fn current_session_id(&self) -> Option<String> {
        lock_current(&self.shared)
            .as_ref()
            .map(|live| live.session.id.clone())
    }

    /// Full message history of the live session, cloned.
    pub fn current_messages(&self) -> Vec<ChatMessage> {
        lock_current(&self.shared)
            .as_ref()
            .map(|live| live.session.messages.clone())
            .unwrap_or_default()
    }

    /// Persistence state of the live session.
    pub fn save_state(&self) -> Option<SaveState> {
        lock_current(&self.shared).as_ref().map(|live| live.state)
    }

    fn install(&self, session: Session, state: SaveState) {
        let mut guard = lock_current(&self.shared);
        *guard = Some(LiveSession {
            session,
            state,
            generation: 0,
        });
    }

    async fn flush(&self, force: bool) -> Result<Option<String>, ChamberError> {
        let (ack, done) = oneshot::channel();
        self.saver_tx
            .send(SaverCommand::Flush { force, ack })
            .map_err(|_| ChamberError::Internal("session saver task is gone".to_string()))?;
        done.await
            .map_err(|_| ChamberError::Internal("session saver task is gone".to_string()))?
    }
}

fn validate(session: &Session) -> Result<(), &'static str> {
    if session.id.is_empty() {
        return Err("empty id");
    }
    if session.created_at.is_empty() {
        return Err("empty createdAt");
    }
    Ok(())
}

/// Title derived from a user message, or `None` when it cannot name a chat.
fn title_from(message: &ChatMessage) -> Option<String> {
    if message.role != Role::User {
        return None;
    }
    let text = message.text_content().trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= TITLE_MAX_CHARS {
        return Some(text.to_string());
    }
    let head: String = text.chars().take(TITLE_MAX_CHARS - 3).collect();
    Some(format!("{}...", head.trim_end()))
}

/// Title for a pre-seeded history: the first user message that has text.
pub(crate) fn title_for_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .find_map(title_from)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chamber_core::EmergencyBackup;
    use chamber_test_utils::{ManualClock, MemorySessionStore, MemorySyncKv, SeqIdGen};

    use crate::backup::BACKUP_KEY;

    struct Harness {
        manager: SessionManager,
        store: Arc<MemorySessionStore>,
        kv: Arc<MemorySyncKv>,
        clock: Arc<ManualClock>,
        bus: EventBus,
    }

    fn start() -> Harness {
        let store = Arc::new(MemorySessionStore::new());
        let kv = Arc::new(MemorySyncKv::new());
        let clock = Arc::new(ManualClock::at("2026-03-01T12:00:00Z".parse().unwrap()));
        let bus = EventBus::default();
        let manager = SessionManager::new(
            store.clone(),
            kv.clone(),
            clock.clone(),
            Arc::new(SeqIdGen::new("session")),
            bus.clone(),
            SessionConfig::default(),
        );
        Harness {
            manager,
            store,
            kv,
            clock,
            bus,
        }
    }

    fn stored_session(id: &str, created_at: &str, count: usize) -> Session {
        Session {
            id: id.to_string(),
            title: "Stored".to_string(),
            created_at: created_at.to_string(),
            messages: (0..count)
                .map(|n| ChatMessage::user(format!("message {n}")))
                .collect(),
            metadata: SessionMetadata::default(),
        }
    }

    #[test]
    fn save_state_display() {
        assert_eq!(SaveState::Ephemeral.to_string(), "ephemeral");
        assert_eq!(SaveState::Dirty.to_string(), "dirty");
        assert_eq!(SaveState::Saved.to_string(), "saved");
    }

    #[test]
    fn titles_derive_from_the_first_user_message() {
        assert_eq!(title_from(&ChatMessage::assistant("hi there")), None);
        assert_eq!(title_from(&ChatMessage::user("   ")), None);
        assert_eq!(
            title_from(&ChatMessage::user("What was my top artist?")).as_deref(),
            Some("What was my top artist?")
        );

        let long = "a".repeat(80);
        let clipped = title_from(&ChatMessage::user(long)).unwrap();
        assert_eq!(clipped.chars().count(), 50);
        assert!(clipped.ends_with("..."));

        assert_eq!(
            title_for_messages(&[ChatMessage::assistant("welcome")]),
            DEFAULT_TITLE
        );
        assert_eq!(
            title_for_messages(&[
                ChatMessage::assistant("welcome"),
                ChatMessage::user("show me 2021"),
            ]),
            "show me 2021"
        );
    }

    #[tokio::test]
    async fn create_new_session_starts_ephemeral() {
        let h = start();
        let id = h.manager.create_new_session(None).await.unwrap();

        assert_eq!(id, "session-1");
        let session = h.manager.current_session().unwrap();
        assert_eq!(session.title, DEFAULT_TITLE);
        assert_eq!(session.created_at, "2026-03-01T12:00:00.000Z");
        assert_eq!(h.manager.save_state(), Some(SaveState::Ephemeral));
        assert_eq!(h.store.save_count(), 0);
    }

    #[tokio::test]
    async fn first_user_message_titles_the_session() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();

        h.manager
            .append_message(ChatMessage::user("How many hours in March 2021?"));
        h.manager.append_message(ChatMessage::assistant("34.5 hours."));
        h.manager.append_message(ChatMessage::user("And April?"));

        let session = h.manager.current_session().unwrap();
        assert_eq!(session.title, "How many hours in March 2021?");
        assert_eq!(session.messages.len(), 3);
        assert_eq!(h.manager.save_state(), Some(SaveState::Dirty));
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_save_lands_after_the_window() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        h.manager.append_message(ChatMessage::user("hello"));
        h.manager.save_conversation();

        assert_eq!(h.store.save_count(), 0);
        tokio::time::sleep(Duration::from_millis(2_100)).await;

        assert_eq!(h.store.save_count(), 1);
        let stored = h.store.get_session("session-1").await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(h.manager.save_state(), Some(SaveState::Saved));
    }

    #[tokio::test(start_paused = true)]
    async fn edits_in_one_window_coalesce_into_one_write() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        for text in ["one", "two", "three"] {
            h.manager.append_message(ChatMessage::user(text));
            h.manager.save_conversation();
        }

        tokio::time::sleep(Duration::from_millis(2_100)).await;

        assert_eq!(h.store.save_count(), 1);
        let stored = h.store.get_session("session-1").await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn a_new_edit_resets_the_debounce_window() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        h.manager.append_message(ChatMessage::user("first"));
        h.manager.save_conversation();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        h.manager.append_message(ChatMessage::user("second"));
        h.manager.save_conversation();

        // 1.9 s after the second edit the original deadline has long passed,
        // but the extended one has not.
        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert_eq!(h.store.save_count(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.store.save_count(), 1);
    }

    #[tokio::test]
    async fn save_current_session_writes_immediately() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        h.manager.append_message(ChatMessage::user("hello"));

        h.manager.save_current_session().await.unwrap();

        assert_eq!(h.store.save_count(), 1);
        assert_eq!(h.manager.save_state(), Some(SaveState::Saved));
    }

    #[tokio::test]
    async fn durable_writes_keep_only_the_trailing_window() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        for n in 0..105 {
            h.manager.append_message(ChatMessage::user(format!("message {n}")));
        }

        h.manager.save_current_session().await.unwrap();

        let stored = h.store.get_session("session-1").await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 100);
        assert_eq!(stored.messages[0].text_content(), "message 5");
        // The live history keeps its full length.
        assert_eq!(h.manager.current_messages().len(), 105);
    }

    #[tokio::test]
    async fn created_at_never_changes_after_creation() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        h.manager.append_message(ChatMessage::user("early"));
        h.manager.save_current_session().await.unwrap();

        h.clock.advance(chrono::Duration::hours(3));
        h.manager.append_message(ChatMessage::user("late"));
        h.manager.save_current_session().await.unwrap();

        let stored = h.store.get_session("session-1").await.unwrap().unwrap();
        assert_eq!(stored.created_at, "2026-03-01T12:00:00.000Z");
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn load_session_rejects_malformed_records() {
        let h = start();
        let mut bad = stored_session("bad", "2026-01-01T00:00:00.000Z", 1);
        bad.created_at = String::new();
        h.store.save_session(&bad).await.unwrap();

        assert!(h.manager.load_session("bad").await.unwrap().is_none());
        assert!(h.manager.current_session_id().is_none());
    }

    #[tokio::test]
    async fn switch_session_flushes_the_outgoing_session() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        h.manager.append_message(ChatMessage::user("from the first chat"));
        h.store
            .save_session(&stored_session("other", "2026-01-01T00:00:00.000Z", 2))
            .await
            .unwrap();

        let loaded = h.manager.switch_session("other").await.unwrap().unwrap();

        assert_eq!(loaded.id, "other");
        assert_eq!(h.manager.current_session_id().as_deref(), Some("other"));
        let first = h.store.get_session("session-1").await.unwrap().unwrap();
        assert_eq!(first.messages.len(), 1);
    }

    #[tokio::test]
    async fn switching_to_a_missing_session_keeps_current() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();

        assert!(h.manager.switch_session("nope").await.unwrap().is_none());
        assert_eq!(h.manager.current_session_id().as_deref(), Some("session-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_the_current_session_starts_a_fresh_chat() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        h.manager.append_message(ChatMessage::user("doomed"));
        h.manager.save_conversation();

        let replacement = h.manager.delete_session_by_id("session-1").await.unwrap();

        assert_eq!(replacement.as_deref(), Some("session-2"));
        assert_eq!(h.manager.current_session_id().as_deref(), Some("session-2"));
        assert!(h.manager.current_messages().is_empty());

        // The pending debounced save must not resurrect the deleted session.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(h.store.get_session("session-1").await.unwrap().is_none());
        assert_eq!(h.store.save_count(), 0);
    }

    #[tokio::test]
    async fn deleting_a_background_session_keeps_current() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        h.store
            .save_session(&stored_session("other", "2026-01-01T00:00:00.000Z", 2))
            .await
            .unwrap();

        let replacement = h.manager.delete_session_by_id("other").await.unwrap();

        assert!(replacement.is_none());
        assert_eq!(h.manager.current_session_id().as_deref(), Some("session-1"));
        assert!(h.store.get_session("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_updates_store_and_live_session() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        h.manager.append_message(ChatMessage::user("hello"));
        h.manager.save_current_session().await.unwrap();

        h.manager.rename_session("session-1", "Road Trip").await.unwrap();

        assert_eq!(h.manager.current_session().unwrap().title, "Road Trip");
        let stored = h.store.get_session("session-1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Road Trip");
    }

    #[tokio::test]
    async fn shutdown_snapshot_is_synchronous_and_capped() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        for n in 0..120 {
            h.manager.append_message(ChatMessage::user(format!("message {n}")));
        }

        h.manager.snapshot_for_shutdown().unwrap();

        let raw = h.kv.get_item(BACKUP_KEY).unwrap().unwrap();
        let backup: EmergencyBackup = serde_json::from_str(&raw).unwrap();
        assert_eq!(backup.session_id, "session-1");
        assert_eq!(backup.created_at, "2026-03-01T12:00:00.000Z");
        assert_eq!(backup.messages.len(), 100);
        assert_eq!(backup.timestamp, h.clock.now().timestamp_millis());
    }

    #[tokio::test]
    async fn empty_sessions_write_no_backup() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();

        h.manager.snapshot_for_shutdown().unwrap();

        assert!(h.kv.get_item(BACKUP_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn flush_on_hide_persists_pending_edits() {
        let h = start();
        h.manager.create_new_session(None).await.unwrap();
        h.manager.append_message(ChatMessage::user("about to hide"));

        h.manager.flush_on_hide().await.unwrap();

        assert_eq!(h.store.save_count(), 1);
        assert_eq!(h.manager.save_state(), Some(SaveState::Saved));
    }

    #[tokio::test]
    async fn lifecycle_events_reach_bus_subscribers() {
        let h = start();
        let mut events = h.bus.subscribe();

        h.manager.create_new_session(None).await.unwrap();
        h.manager.append_message(ChatMessage::user("hello"));
        h.manager.save_current_session().await.unwrap();
        h.manager.delete_session_by_id("session-1").await.unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            EngineEvent::SessionCreated { session_id } if session_id == "session-1"
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            EngineEvent::SessionUpdated { session_id } if session_id == "session-1"
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            EngineEvent::SessionDeleted { session_id } if session_id == "session-1"
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            EngineEvent::SessionCreated { session_id } if session_id == "session-2"
        ));
    }
}
