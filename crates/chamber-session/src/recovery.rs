// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boot-time reconciliation of the durable store with leftover snapshots.
//!
//! Two sources are checked, in order: the legacy single-conversation blob
//! kept by early builds, and the emergency snapshot written on the last
//! shutdown. Both are consumed exactly once; whatever the outcome, their
//! keys are removed so the next boot starts clean. Component failures are
//! reported to the caller, who treats them as non-fatal and keeps the
//! source in place for the next attempt.

use tracing::{debug, info, warn};

use chamber_core::{
    ChamberError, ChatMessage, Clock, EmergencyBackup, EngineEvent, EventBus, IdGen, Session,
    SessionMetadata, SessionStore, SyncKv,
};

use crate::backup::BACKUP_KEY;
use crate::manager::title_for_messages;

/// Key the pre-durable-store builds kept their single conversation under.
pub const LEGACY_CONVERSATION_KEY: &str = "rhythm_chamber_conversation";

/// Title given to sessions materialized from an emergency snapshot.
pub const RECOVERED_TITLE: &str = "Recovered Chat";

/// What boot recovery did with the emergency snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No snapshot was present.
    NoBackup,
    /// A new session was materialized from the snapshot.
    Recovered { session_id: String },
    /// The durable record was behind the snapshot and has been updated.
    Merged { session_id: String },
    /// The snapshot was dropped without touching the store.
    Discarded(DiscardReason),
}

/// Why a snapshot was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The payload did not decode to a usable snapshot.
    Unreadable,
    /// Older than the recovery window.
    Stale,
    /// The durable record already has at least as many messages.
    DurableCurrent,
}

/// What boot migration did with the legacy conversation blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    NoLegacyBlob,
    Imported { session_id: String },
    Skipped,
}

/// Reconcile the emergency snapshot with the durable store.
///
/// A snapshot no older than `max_age_secs` either materializes a new session
/// (no durable record), or replaces a durable history that has fewer
/// messages. `createdAt` always comes from the existing record when one
/// exists. The snapshot key is removed in every outcome; on a store failure
/// it is kept so the next boot can retry.
pub async fn recover_from_backup(
    store: &dyn SessionStore,
    kv: &dyn SyncKv,
    clock: &dyn Clock,
    bus: &EventBus,
    max_age_secs: u64,
) -> Result<RecoveryOutcome, ChamberError> {
    let Some(raw) = kv.get_item(BACKUP_KEY)? else {
        return Ok(RecoveryOutcome::NoBackup);
    };

    let backup: EmergencyBackup = match serde_json::from_str(&raw) {
        Ok(backup) => backup,
        Err(error) => {
            warn!(%error, "discarding unreadable emergency backup");
            kv.remove_item(BACKUP_KEY)?;
            return Ok(RecoveryOutcome::Discarded(DiscardReason::Unreadable));
        }
    };
    if backup.session_id.is_empty() {
        warn!("discarding emergency backup without a session id");
        kv.remove_item(BACKUP_KEY)?;
        return Ok(RecoveryOutcome::Discarded(DiscardReason::Unreadable));
    }

    let age_ms = clock.now().timestamp_millis() - backup.timestamp;
    let max_ms = i64::try_from(max_age_secs.saturating_mul(1_000)).unwrap_or(i64::MAX);
    if age_ms > max_ms {
        debug!(
            session_id = %backup.session_id,
            age_ms,
            "emergency backup is past the recovery window, discarding"
        );
        kv.remove_item(BACKUP_KEY)?;
        return Ok(RecoveryOutcome::Discarded(DiscardReason::Stale));
    }

    let outcome = match store.get_session(&backup.session_id).await? {
        None => {
            let session = Session {
                id: backup.session_id.clone(),
                title: RECOVERED_TITLE.to_string(),
                created_at: backup.created_at,
                messages: backup.messages,
                metadata: SessionMetadata::default(),
            };
            store.save_session(&session).await?;
            info!(
                session_id = %session.id,
                messages = session.messages.len(),
                "materialized session from emergency backup"
            );
            bus.publish(EngineEvent::SessionCreated {
                session_id: session.id.clone(),
            });
            RecoveryOutcome::Recovered {
                session_id: session.id,
            }
        }
        Some(mut durable) if durable.messages.len() < backup.messages.len() => {
            durable.messages = backup.messages;
            store.save_session(&durable).await?;
            info!(
                session_id = %durable.id,
                messages = durable.messages.len(),
                "updated durable session from emergency backup"
            );
            bus.publish(EngineEvent::SessionUpdated {
                session_id: durable.id.clone(),
            });
            RecoveryOutcome::Merged {
                session_id: durable.id,
            }
        }
        Some(durable) => {
            debug!(
                session_id = %durable.id,
                "durable session is current, discarding emergency backup"
            );
            RecoveryOutcome::Discarded(DiscardReason::DurableCurrent)
        }
    };

    kv.remove_item(BACKUP_KEY)?;
    Ok(outcome)
}

/// Import the legacy single-conversation blob, once.
///
/// The durable store wins: the blob is only imported when no sessions exist
/// yet. It is removed afterwards either way.
pub async fn migrate_legacy_conversation(
    store: &dyn SessionStore,
    kv: &dyn SyncKv,
    clock: &dyn Clock,
    ids: &dyn IdGen,
    bus: &EventBus,
) -> Result<MigrationOutcome, ChamberError> {
    let Some(raw) = kv.get_item(LEGACY_CONVERSATION_KEY)? else {
        return Ok(MigrationOutcome::NoLegacyBlob);
    };

    let messages: Vec<ChatMessage> = match serde_json::from_str(&raw) {
        Ok(messages) => messages,
        Err(error) => {
            warn!(%error, "discarding unreadable legacy conversation blob");
            kv.remove_item(LEGACY_CONVERSATION_KEY)?;
            return Ok(MigrationOutcome::Skipped);
        }
    };

    if !store.all_sessions().await?.is_empty() {
        debug!("durable sessions exist, dropping the legacy conversation blob");
        kv.remove_item(LEGACY_CONVERSATION_KEY)?;
        return Ok(MigrationOutcome::Skipped);
    }
    if messages.is_empty() {
        debug!("legacy conversation blob is empty, dropping it");
        kv.remove_item(LEGACY_CONVERSATION_KEY)?;
        return Ok(MigrationOutcome::Skipped);
    }

    let session = Session {
        id: ids.new_id(),
        title: title_for_messages(&messages),
        created_at: clock.now_rfc3339(),
        messages,
        metadata: SessionMetadata::default(),
    };
    store.save_session(&session).await?;
    info!(
        session_id = %session.id,
        messages = session.messages.len(),
        "imported legacy conversation into a new session"
    );
    bus.publish(EngineEvent::SessionCreated {
        session_id: session.id.clone(),
    });

    kv.remove_item(LEGACY_CONVERSATION_KEY)?;
    Ok(MigrationOutcome::Imported {
        session_id: session.id,
    })
}
