// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emergency snapshot written on the synchronous shutdown path.
//!
//! Debounced saves cannot run once the host is tearing down, so the manager
//! writes a last-chance copy of the live session through [`SyncKv`]. Boot
//! recovery in [`crate::recovery`] reads it back and reconciles it with the
//! durable store.

use chamber_core::{ChamberError, ChatMessage, EmergencyBackup, Session, SyncKv};

/// Key the emergency snapshot is stored under.
pub const BACKUP_KEY: &str = "rhythm_chamber_emergency_backup";

/// The last `cap` messages of a history, cloned.
pub(crate) fn trailing(messages: &[ChatMessage], cap: usize) -> Vec<ChatMessage> {
    let start = messages.len().saturating_sub(cap);
    messages[start..].to_vec()
}

/// Serialize the session into the backup slot.
///
/// Must stay free of awaits: the caller runs inside a shutdown hook.
pub(crate) fn write_backup(
    kv: &dyn SyncKv,
    session: &Session,
    cap: usize,
    now_ms: i64,
) -> Result<(), ChamberError> {
    let backup = EmergencyBackup {
        session_id: session.id.clone(),
        created_at: session.created_at.clone(),
        messages: trailing(&session.messages, cap),
        timestamp: now_ms,
    };
    let raw = serde_json::to_string(&backup)
        .map_err(|e| ChamberError::Internal(format!("failed to encode emergency backup: {e}")))?;
    kv.set_item(BACKUP_KEY, &raw)
}
