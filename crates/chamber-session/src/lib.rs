// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle for the Rhythm Chamber turn engine.
//!
//! [`SessionManager`] owns the live conversation: edits land in memory
//! immediately and reach the durable store through a debounced background
//! writer, so a burst of appends costs one write. Because the debounce can
//! lose the tail of a conversation when the host closes, the manager also
//! writes a synchronous emergency snapshot on shutdown and reconciles it
//! with the store on the next boot.

pub mod backup;
pub mod manager;
pub mod recovery;

mod saver;

pub use backup::BACKUP_KEY;
pub use manager::{DEFAULT_TITLE, SaveState, SessionManager};
pub use recovery::{
    DiscardReason, LEGACY_CONVERSATION_KEY, MigrationOutcome, RECOVERED_TITLE, RecoveryOutcome,
    migrate_legacy_conversation, recover_from_backup,
};
